use std::sync::Arc;

use log::error;
use rocket::tokio::task;

use crate::auth::{Context, JwtKeys, PrincipalExtractor};
use crate::db::Store;
use crate::types::ApiError;
use crate::users::models::User;

/// Managed Rocket state shared by every route.
pub struct App {
    store: Arc<dyn Store>,
    keys: Arc<JwtKeys>,
}

impl App {
    pub fn new(store: Arc<dyn Store>, keys: JwtKeys) -> Self {
        App {
            store,
            keys: Arc::new(keys),
        }
    }

    pub fn extractor(&self) -> &dyn PrincipalExtractor {
        &*self.keys
    }

    pub fn token(&self, user: &User) -> Result<String, ApiError> {
        self.keys.issue(user)
    }

    /// Runs `op` on the blocking pool. If the request future goes away first
    /// the context is cancelled and `op` stops at its next checkpoint.
    pub async fn run<T, F>(&self, ctx: Context, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Store, &Context) -> Result<T, ApiError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let guard = ctx.cancel_token().drop_guard();
        let joined = task::spawn_blocking(move || op(&*store, &ctx)).await;
        guard.disarm();
        joined.unwrap_or_else(|e| {
            error!("request task failed: {}", e);
            Err(ApiError::Internal)
        })
    }
}
