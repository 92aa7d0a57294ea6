//! Loads the aggregates a request names.
//!
//! Ids supplied by the client that do not resolve are a bad request, not a
//! missing resource; only the principal's own record maps to `NotFound`.

use log::warn;

use crate::article::Article;
use crate::auth::Context;
use crate::comment::Comment;
use crate::db::{Store, StoreError};
use crate::types::{ApiError, Target};
use crate::users::models::User;

pub fn parse_id(raw: &str, target: Target) -> Result<i32, ApiError> {
    raw.trim().parse::<i32>().map_err(|_| ApiError::MalformedId(target))
}

fn target_error(err: StoreError, target: Target) -> ApiError {
    match err {
        StoreError::Cancelled => ApiError::Cancelled,
        StoreError::NotFound => ApiError::TargetNotFound(target),
        other => {
            warn!("loading {:?} failed: {}", target, other);
            ApiError::TargetNotFound(target)
        }
    }
}

pub fn article(store: &dyn Store, ctx: &Context, slug: &str) -> Result<Article, ApiError> {
    let id = parse_id(slug, Target::Article)?;
    ctx.checkpoint()?;
    store.article_by_id(id).map_err(|e| target_error(e, Target::Article))
}

pub fn comment(store: &dyn Store, ctx: &Context, raw_id: &str) -> Result<Comment, ApiError> {
    let id = parse_id(raw_id, Target::Comment)?;
    ctx.checkpoint()?;
    store.comment_by_id(id).map_err(|e| target_error(e, Target::Comment))
}

pub fn user_by_name(store: &dyn Store, ctx: &Context, username: &str) -> Result<User, ApiError> {
    ctx.checkpoint()?;
    store
        .user_by_username(username)
        .map_err(|e| target_error(e, Target::User))
}

/// The authenticated user's own record.
pub fn principal(store: &dyn Store, ctx: &Context) -> Result<User, ApiError> {
    let id = ctx.require_principal()?;
    ctx.checkpoint()?;
    store.user_by_id(id).map_err(|e| match e {
        StoreError::Cancelled => ApiError::Cancelled,
        StoreError::NotFound => ApiError::PrincipalNotFound,
        other => {
            warn!("loading principal {} failed: {}", id, other);
            ApiError::PrincipalNotFound
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Spy};

    #[test]
    fn slugs_must_be_integers() {
        let store = testing::seeded();
        let ctx = Context::anonymous();
        assert!(matches!(
            article(&store, &ctx, "how-to-train-your-dragon"),
            Err(ApiError::MalformedId(Target::Article))
        ));
        assert!(matches!(
            comment(&store, &ctx, "1.5"),
            Err(ApiError::MalformedId(Target::Comment))
        ));
    }

    #[test]
    fn unknown_targets_are_bad_requests() {
        let store = testing::seeded();
        let ctx = Context::anonymous();
        assert!(matches!(
            article(&store, &ctx, "999"),
            Err(ApiError::TargetNotFound(Target::Article))
        ));
        assert!(matches!(
            comment(&store, &ctx, "999"),
            Err(ApiError::TargetNotFound(Target::Comment))
        ));
        assert!(matches!(
            user_by_name(&store, &ctx, "nobody"),
            Err(ApiError::TargetNotFound(Target::User))
        ));
    }

    #[test]
    fn backend_errors_on_targets_are_bad_requests_too() {
        let spy = Spy::new(testing::seeded()).failing("article_by_id");
        let err = article(&spy, &Context::anonymous(), "1").unwrap_err();
        assert!(matches!(err, ApiError::TargetNotFound(Target::Article)));
    }

    #[test]
    fn missing_principal_record_is_not_found() {
        let store = testing::seeded();
        let err = principal(&store, &Context::for_user(404)).unwrap_err();
        assert!(matches!(err, ApiError::PrincipalNotFound));

        let err = principal(&store, &Context::anonymous()).unwrap_err();
        assert!(matches!(err, ApiError::NoPrincipal));

        assert_eq!(principal(&store, &Context::for_user(1)).unwrap().username, "jake");
    }

    #[test]
    fn cancelled_context_skips_the_store() {
        let spy = Spy::new(testing::seeded());
        let ctx = Context::for_user(1);
        ctx.cancel_token().cancel();
        assert!(matches!(article(&spy, &ctx, "1"), Err(ApiError::Cancelled)));
        assert_eq!(spy.calls("article_by_id"), 0);
    }
}
