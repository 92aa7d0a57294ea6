use rocket::serde::json::Json;
use rocket::{get, post, put, State};
use serde_derive::Deserialize;

use crate::app::App;
use crate::auth::Context;
use crate::db::{Store, StoreError};
use crate::loader;
use crate::types::{ApiError, ApiResult, ValidationError};

pub mod models;
mod utils;

use self::models::{NewUser, User, UserResponse, UserView};
use self::utils::*;

#[derive(Debug, Deserialize)]
pub struct RegistrationDetails {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    pub user: RegistrationDetails,
}

#[derive(Debug, Deserialize)]
pub struct LoginDetails {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Login {
    pub user: LoginDetails,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub user: UpdateUser,
}

fn invalid_credentials() -> ApiError {
    ValidationError::from("email or password", "is invalid").into()
}

pub fn register_user(store: &dyn Store, ctx: &Context, req: RegistrationDetails) -> Result<User, ApiError> {
    ctx.checkpoint()?;
    let mut errors = validate_email(store, &req.email, None)?;
    errors.merge(validate_username(store, &req.username, None)?);
    if let Err(e) = validate_password(&req.password) {
        errors.merge(e);
    }
    errors.into_result()?;

    let new_user = NewUser {
        username: req.username,
        email: req.email,
        password: User::make_password(&req.password).map_err(|_| ApiError::Internal)?,
    };
    ctx.checkpoint()?;
    store.create_user(&new_user).map_err(|e| match e {
        StoreError::Conflict(_) => ValidationError::from("username", "Username or email already exists").into(),
        other => ApiError::from(other),
    })
}

pub fn login_user(store: &dyn Store, ctx: &Context, req: LoginDetails) -> Result<User, ApiError> {
    ctx.checkpoint()?;
    let user = match store.user_by_email(&req.email) {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(invalid_credentials()),
        Err(other) => return Err(other.into()),
    };
    if user.verify_password(&req.password)? {
        Ok(user)
    } else {
        Err(invalid_credentials())
    }
}

pub fn current_user(store: &dyn Store, ctx: &Context) -> Result<User, ApiError> {
    loader::principal(store, ctx)
}

pub fn update_user(store: &dyn Store, ctx: &Context, update: UpdateUser) -> Result<User, ApiError> {
    let mut user = loader::principal(store, ctx)?;
    let mut error = ValidationError::default();
    ctx.checkpoint()?;

    if let Some(new_email) = update.email {
        let found = validate_email(store, &new_email, Some(user.id))?;
        if found.empty() {
            user.email = new_email;
        }
        error.merge(found);
    }

    if let Some(new_username) = update.username {
        let found = validate_username(store, &new_username, Some(user.id))?;
        if found.empty() {
            user.username = new_username;
        }
        error.merge(found);
    }

    if let Some(new_password) = update.password {
        match validate_password(&new_password) {
            Err(e) => error.merge(e),
            Ok(_) => user.new_password(&new_password).map_err(|_| ApiError::Internal)?,
        }
    }

    if update.bio.is_some() {
        user.bio = update.bio;
    }
    if update.image.is_some() {
        user.image = update.image;
    }

    error.into_result()?;
    ctx.checkpoint()?;
    Ok(store.update_user(&user)?)
}

fn with_token(app: &App, user: User) -> ApiResult<UserResponse> {
    let token = app.token(&user)?;
    Ok(Json(UserResponse {
        user: UserView::new(user, token),
    }))
}

#[post("/users", format = "json", data = "<registration>")]
pub async fn register(app: &State<App>, ctx: Context, registration: Json<Registration>) -> ApiResult<UserResponse> {
    let req = registration.into_inner().user;
    let user = app.run(ctx, move |store, ctx| register_user(store, ctx, req)).await?;
    with_token(app, user)
}

#[post("/users/login", format = "json", data = "<login>")]
pub async fn login(app: &State<App>, ctx: Context, login: Json<Login>) -> ApiResult<UserResponse> {
    let req = login.into_inner().user;
    let user = app.run(ctx, move |store, ctx| login_user(store, ctx, req)).await?;
    with_token(app, user)
}

#[get("/user")]
pub async fn current(app: &State<App>, ctx: Context) -> ApiResult<UserResponse> {
    let user = app.run(ctx, |store, ctx| current_user(store, ctx)).await?;
    with_token(app, user)
}

#[put("/user", format = "json", data = "<update>")]
pub async fn update(app: &State<App>, ctx: Context, update: Json<Update>) -> ApiResult<UserResponse> {
    let req = update.into_inner().user;
    let user = app.run(ctx, move |store, ctx| update_user(store, ctx, req)).await?;
    with_token(app, user)
}
