//! Viewer-relative flags.
//!
//! Anonymous viewers get `false` for every flag without touching the store.
//! Lists are all-or-nothing: one item that cannot be resolved fails the
//! whole response.

use std::collections::HashMap;

use crate::article::{Article, ArticleView};
use crate::auth::{Context, Viewer};
use crate::comment::{Comment, CommentView};
use crate::db::{Store, StoreResult};
use crate::profile::Profile;
use crate::types::ApiError;
use crate::users::models::User;

pub fn favorited(store: &dyn Store, ctx: &Context, viewer: Viewer, article: &Article) -> StoreResult<bool> {
    match viewer {
        Viewer::Anonymous => Ok(false),
        Viewer::User(id) => {
            ctx.store_checkpoint()?;
            store.is_favorited(article.id, id)
        }
    }
}

pub fn following(store: &dyn Store, ctx: &Context, viewer: Viewer, user_id: i32) -> StoreResult<bool> {
    match viewer {
        Viewer::User(id) if id != user_id => {
            ctx.store_checkpoint()?;
            store.is_following(id, user_id)
        }
        _ => Ok(false),
    }
}

fn author(store: &dyn Store, ctx: &Context, viewer: Viewer, author_id: i32) -> StoreResult<Profile> {
    ctx.store_checkpoint()?;
    let user = store.user_by_id(author_id)?;
    let following = following(store, ctx, viewer, user.id)?;
    Ok(Profile::from_user(user, following))
}

fn article_view(
    store: &dyn Store,
    ctx: &Context,
    viewer: Viewer,
    article: Article,
    authors: &mut HashMap<i32, Profile>,
) -> StoreResult<ArticleView> {
    let author = match authors.get(&article.author_id) {
        Some(profile) => profile.clone(),
        None => {
            let profile = author(store, ctx, viewer, article.author_id)?;
            authors.insert(article.author_id, profile.clone());
            profile
        }
    };
    let favorited = favorited(store, ctx, viewer, &article)?;
    Ok(ArticleView::new(article, author, favorited))
}

pub fn profile(store: &dyn Store, ctx: &Context, viewer: Viewer, user: User) -> Result<Profile, ApiError> {
    let following = following(store, ctx, viewer, user.id)?;
    Ok(Profile::from_user(user, following))
}

pub fn article(store: &dyn Store, ctx: &Context, viewer: Viewer, article: Article) -> Result<ArticleView, ApiError> {
    Ok(article_view(store, ctx, viewer, article, &mut HashMap::new())?)
}

/// For callers that already know the favorited flag, e.g. right after a mutation.
pub fn article_with_flag(
    store: &dyn Store,
    ctx: &Context,
    viewer: Viewer,
    article: Article,
    favorited: bool,
) -> Result<ArticleView, ApiError> {
    let author = author(store, ctx, viewer, article.author_id)?;
    Ok(ArticleView::new(article, author, favorited))
}

pub fn articles(
    store: &dyn Store,
    ctx: &Context,
    viewer: Viewer,
    articles: Vec<Article>,
) -> Result<Vec<ArticleView>, ApiError> {
    let mut authors = HashMap::new();
    articles
        .into_iter()
        .map(|article| article_view(store, ctx, viewer, article, &mut authors).map_err(ApiError::enrichment))
        .collect()
}

pub fn comments(
    store: &dyn Store,
    ctx: &Context,
    viewer: Viewer,
    comments: Vec<Comment>,
) -> Result<Vec<CommentView>, ApiError> {
    let mut authors: HashMap<i32, Profile> = HashMap::new();
    let mut views = Vec::with_capacity(comments.len());
    for comment in comments {
        let profile = match authors.get(&comment.user_id) {
            Some(profile) => profile.clone(),
            None => {
                let profile = author(store, ctx, viewer, comment.user_id).map_err(ApiError::enrichment)?;
                authors.insert(comment.user_id, profile.clone());
                profile
            }
        };
        views.push(CommentView::new(comment, profile));
    }
    Ok(views)
}
