#[macro_use]
extern crate error_chain;

mod app;
mod article;
mod auth;
mod comment;
mod config;
mod db;
mod enrich;
mod loader;
mod policy;
mod profile;
mod relation;
mod types;
mod users;
mod utils;

#[cfg(test)]
mod testing;

use std::process;
use std::sync::Arc;

use error_chain::ChainedError;
use log::{info, warn};
use rocket::fairing::AdHoc;
use rocket::http::Status;
use rocket::request::Request;
use rocket::serde::json::Value;
use rocket::{catch, catchers, routes, Build, Rocket};
use serde_json::json;

use crate::app::App;
use crate::auth::JwtKeys;
use crate::config::Config;
use crate::db::{MemoryStore, PgStore, Store};

fn error_body(message: &str) -> Value {
    json!({ "errors": { "body": [message] } })
}

#[catch(400)]
fn bad_request() -> Value {
    error_body("malformed request")
}

#[catch(404)]
fn not_found(req: &Request) -> Value {
    error_body(&format!("no route for {}", req.uri().path()))
}

#[catch(422)]
fn unprocessable(_req: &Request) -> Value {
    error_body("request body could not be parsed")
}

#[catch(500)]
fn internal(status: Status, _req: &Request) -> Value {
    error_body(status.reason().unwrap_or("internal error"))
}

fn build(app: App) -> Rocket<Build> {
    rocket::build()
        .manage(app)
        .mount("/api", routes![users::register, users::login, users::current, users::update])
        .mount("/api", routes![profile::profile, profile::follow, profile::unfollow])
        .mount(
            "/api",
            routes![
                article::list,
                article::feed,
                article::show,
                article::create,
                article::update,
                article::remove,
                article::favorite,
                article::unfavorite,
                article::tags,
            ],
        )
        .mount("/api", routes![comment::add, comment::list, comment::remove])
        .register("/", catchers![bad_request, not_found, unprocessable, internal])
}

fn app_from(config: &Config) -> config::Result<App> {
    let keys = JwtKeys::new(config.secret_key.as_bytes(), config.token_ttl_secs)
        .map_err(|e| format!("unusable SECRET_KEY: {}", e))?;
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => Arc::new(PgStore::new(config::init_pool(url)?)),
        None => Arc::new(MemoryStore::new()),
    };
    Ok(App::new(store, keys))
}

#[rocket::main]
async fn main() {
    let config = Config::from_env().and_then(|config| app_from(&config).map(|app| (config, app)));
    let (config, app) = match config {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{}", e.display_chain());
            process::exit(1);
        }
    };

    let persistent = config.database_url.is_some();
    let rocket = build(app).attach(AdHoc::on_liftoff("Store", move |_| {
        Box::pin(async move {
            if persistent {
                info!("serving from PostgreSQL");
            } else {
                warn!("DATABASE_URL is not set, data lives in memory only");
            }
        })
    }));

    if let Err(e) = rocket.launch().await {
        eprintln!("server failed: {}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::{ContentType, Header};
    use rocket::local::blocking::{Client, LocalResponse};

    fn client() -> Client {
        let keys = JwtKeys::new(b"0123456789abcdef0123", 3600).unwrap();
        let app = App::new(Arc::new(testing::seeded()), keys);
        Client::tracked(build(app)).unwrap()
    }

    fn auth(token: &str) -> Header<'static> {
        Header::new("Authorization", format!("Token {}", token))
    }

    fn body(response: LocalResponse) -> Value {
        response.into_json::<Value>().unwrap()
    }

    fn register(client: &Client, username: &str) -> String {
        let response = client
            .post("/api/users")
            .header(ContentType::JSON)
            .body(
                json!({ "user": {
                    "username": username,
                    "email": format!("{}@conduit.io", username),
                    "password": "hunter22",
                }})
                .to_string(),
            )
            .dispatch();
        assert_eq!(response.status(), Status::Ok);
        body(response)["user"]["token"].as_str().unwrap().to_owned()
    }

    fn create_article(client: &Client, token: &str) -> String {
        let response = client
            .post("/api/articles")
            .header(ContentType::JSON)
            .header(auth(token))
            .body(
                json!({ "article": {
                    "title": "How to train your dragon",
                    "description": "Ever wonder how?",
                    "body": "You have to believe",
                    "tagList": ["dragons", "training"],
                }})
                .to_string(),
            )
            .dispatch();
        assert_eq!(response.status(), Status::Ok);
        body(response)["article"]["slug"].as_str().unwrap().to_owned()
    }

    #[test]
    fn register_login_and_current_user() {
        let client = client();
        let token = register(&client, "rick");

        let response = client.get("/api/user").header(auth(&token)).dispatch();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(body(response)["user"]["username"], "rick");

        let response = client
            .post("/api/users/login")
            .header(ContentType::JSON)
            .body(json!({ "user": { "email": "rick@conduit.io", "password": "hunter22" } }).to_string())
            .dispatch();
        assert_eq!(response.status(), Status::Ok);
        assert!(body(response)["user"]["token"].is_string());
    }

    #[test]
    fn favorite_round_trip() {
        let client = client();
        let token = register(&client, "rick");
        let slug = create_article(&client, &token);

        let response = client
            .post(format!("/api/articles/{}/favorite", slug))
            .header(auth(&token))
            .dispatch();
        assert_eq!(response.status(), Status::Ok);
        let article = body(response);
        assert_eq!(article["article"]["favorited"], true);
        assert_eq!(article["article"]["favoritesCount"], 1);

        let response = client.get(format!("/api/articles/{}", slug)).dispatch();
        let article = body(response);
        assert_eq!(article["article"]["favorited"], false);
        assert_eq!(article["article"]["favoritesCount"], 1);
        assert_eq!(article["article"]["author"]["username"], "rick");
    }

    #[test]
    fn writes_need_a_token() {
        let client = client();
        let response = client
            .post("/api/articles")
            .header(ContentType::JSON)
            .body(json!({ "article": { "title": "t", "description": "d", "body": "b" } }).to_string())
            .dispatch();
        assert_eq!(response.status(), Status::Unauthorized);
        assert!(body(response)["errors"]["body"].is_array());

        let response = client.get("/api/articles").header(auth("garbage")).dispatch();
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[test]
    fn foreign_article_is_forbidden() {
        let client = client();
        let author = register(&client, "rick");
        let other = register(&client, "morty");
        let slug = create_article(&client, &author);

        let response = client
            .delete(format!("/api/articles/{}", slug))
            .header(auth(&other))
            .dispatch();
        assert_eq!(response.status(), Status::Forbidden);

        let response = client.get(format!("/api/articles/{}", slug)).dispatch();
        assert_eq!(response.status(), Status::Ok);
    }

    #[test]
    fn bad_slug_and_blank_fields_are_unprocessable() {
        let client = client();
        let token = register(&client, "rick");

        let response = client.get("/api/articles/how-to-train-your-dragon").dispatch();
        assert_eq!(response.status(), Status::UnprocessableEntity);

        let response = client
            .post("/api/articles")
            .header(ContentType::JSON)
            .header(auth(&token))
            .body(json!({ "article": { "title": "", "description": "d", "body": "b" } }).to_string())
            .dispatch();
        assert_eq!(response.status(), Status::UnprocessableEntity);
        assert_eq!(body(response)["errors"]["title"][0], "can't be blank");
    }

    #[test]
    fn tags_and_profiles_are_public() {
        let client = client();
        let response = client.get("/api/tags").dispatch();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(body(response)["tags"], json!(["dragons", "rust", "training"]));

        let response = client.get("/api/profiles/jane").dispatch();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(body(response)["profile"]["following"], false);

        let response = client.get("/api/nowhere").dispatch();
        assert_eq!(response.status(), Status::NotFound);
        assert!(body(response)["errors"]["body"].is_array());
    }
}
