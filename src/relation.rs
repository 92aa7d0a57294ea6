//! Favorite and follow edges.
//!
//! Every call is one store round-trip, and the store applies the edge and the
//! counter that mirrors it together. Repeating a call converges on the same
//! state instead of failing.

use log::debug;

use crate::article::Article;
use crate::auth::Context;
use crate::db::{Store, StoreError};
use crate::types::{ApiError, Target};

#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteState {
    pub article: Article,
    pub favorited: bool,
}

/// A missing edge endpoint is either the acting user or the target.
fn mutation_error(store: &dyn Store, err: StoreError, actor_id: i32, target: Target) -> ApiError {
    match err {
        StoreError::NotFound => match store.user_by_id(actor_id) {
            Err(StoreError::NotFound) => ApiError::PrincipalNotFound,
            _ => ApiError::TargetNotFound(target),
        },
        other => ApiError::from(other),
    }
}

pub fn add_favorite(
    store: &dyn Store,
    ctx: &Context,
    article: &Article,
    user_id: i32,
) -> Result<FavoriteState, ApiError> {
    ctx.checkpoint()?;
    let article = store
        .add_favorite(article.id, user_id)
        .map_err(|e| mutation_error(store, e, user_id, Target::Article))?;
    debug!("user {} favorited article {} ({})", user_id, article.id, article.favorites_count);
    Ok(FavoriteState {
        article,
        favorited: true,
    })
}

pub fn remove_favorite(
    store: &dyn Store,
    ctx: &Context,
    article: &Article,
    user_id: i32,
) -> Result<FavoriteState, ApiError> {
    ctx.checkpoint()?;
    let article = store
        .delete_favorite(article.id, user_id)
        .map_err(|e| mutation_error(store, e, user_id, Target::Article))?;
    debug!("user {} unfavorited article {} ({})", user_id, article.id, article.favorites_count);
    Ok(FavoriteState {
        article,
        favorited: false,
    })
}

/// Returns the follower's new `following` flag.
pub fn follow(store: &dyn Store, ctx: &Context, follower_id: i32, followee_id: i32) -> Result<bool, ApiError> {
    ctx.checkpoint()?;
    store
        .follow(follower_id, followee_id)
        .map_err(|e| mutation_error(store, e, follower_id, Target::User))?;
    debug!("user {} follows {}", follower_id, followee_id);
    Ok(true)
}

pub fn unfollow(store: &dyn Store, ctx: &Context, follower_id: i32, followee_id: i32) -> Result<bool, ApiError> {
    ctx.checkpoint()?;
    store
        .unfollow(follower_id, followee_id)
        .map_err(|e| mutation_error(store, e, follower_id, Target::User))?;
    debug!("user {} unfollowed {}", follower_id, followee_id);
    Ok(false)
}
