use rocket::serde::json::Json;
use rocket::{delete, get, post, State};
use serde_derive::Serialize;

use crate::app::App;
use crate::auth::Context;
use crate::db::Store;
use crate::policy::{self, EdgeAction};
use crate::types::{ApiError, ApiResult};
use crate::users::models::User;
use crate::{enrich, loader, relation};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub following: bool,
}

impl Profile {
    pub fn from_user(user: User, following: bool) -> Self {
        Profile {
            username: user.username,
            bio: user.bio,
            image: user.image,
            following,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: Profile,
}

pub struct ProfileRequest {
    pub username: String,
}

pub fn show_profile(store: &dyn Store, ctx: &Context, req: ProfileRequest) -> Result<ProfileResponse, ApiError> {
    let viewer = ctx.viewer()?;
    let user = loader::user_by_name(store, ctx, &req.username)?;
    let profile = enrich::profile(store, ctx, viewer, user)?;
    Ok(ProfileResponse { profile })
}

pub fn follow_user(store: &dyn Store, ctx: &Context, req: ProfileRequest) -> Result<ProfileResponse, ApiError> {
    let current = loader::principal(store, ctx)?;
    let followee = loader::user_by_name(store, ctx, &req.username)?;
    policy::ensure_not_self(current.id, followee.id, EdgeAction::Follow)?;
    let following = relation::follow(store, ctx, current.id, followee.id)?;
    Ok(ProfileResponse {
        profile: Profile::from_user(followee, following),
    })
}

pub fn unfollow_user(store: &dyn Store, ctx: &Context, req: ProfileRequest) -> Result<ProfileResponse, ApiError> {
    let current = loader::principal(store, ctx)?;
    let followee = loader::user_by_name(store, ctx, &req.username)?;
    policy::ensure_not_self(current.id, followee.id, EdgeAction::Unfollow)?;
    let following = relation::unfollow(store, ctx, current.id, followee.id)?;
    Ok(ProfileResponse {
        profile: Profile::from_user(followee, following),
    })
}

#[get("/profiles/<name>")]
pub async fn profile(app: &State<App>, ctx: Context, name: String) -> ApiResult<ProfileResponse> {
    let req = ProfileRequest { username: name };
    app.run(ctx, move |store, ctx| show_profile(store, ctx, req)).await.map(Json)
}

#[post("/profiles/<name>/follow")]
pub async fn follow(app: &State<App>, ctx: Context, name: String) -> ApiResult<ProfileResponse> {
    let req = ProfileRequest { username: name };
    app.run(ctx, move |store, ctx| follow_user(store, ctx, req)).await.map(Json)
}

#[delete("/profiles/<name>/follow")]
pub async fn unfollow(app: &State<App>, ctx: Context, name: String) -> ApiResult<ProfileResponse> {
    let req = ProfileRequest { username: name };
    app.run(ctx, move |store, ctx| unfollow_user(store, ctx, req)).await.map(Json)
}
