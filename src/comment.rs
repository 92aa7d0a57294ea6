use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::debug;
use rocket::serde::json::Json;
use rocket::{delete, get, post, State};
use serde_derive::{Deserialize, Serialize};

use crate::app::App;
use crate::auth::Context;
use crate::db::schema::comments;
use crate::db::Store;
use crate::profile::Profile;
use crate::types::{ApiError, ApiResult, Validate, ValidationError};
use crate::utils::serialize_date;
use crate::{enrich, loader, policy};

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable)]
#[diesel(table_name = comments)]
pub struct Comment {
    pub id: i32,
    pub article_id: i32,
    pub user_id: i32,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment {
    pub article_id: i32,
    pub user_id: i32,
    pub body: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i32,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: DateTime<Utc>,
    pub body: String,
    pub author: Profile,
}

impl CommentView {
    pub fn new(comment: Comment, author: Profile) -> Self {
        CommentView {
            id: comment.id,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            body: comment.body,
            author,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentBody {
    pub body: String,
}

impl Validate for CommentBody {
    fn validate(self) -> Result<Self, ValidationError> {
        if self.body.trim().is_empty() {
            Err(ValidationError::from("body", "can't be blank"))
        } else {
            Ok(self)
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentContainer<T> {
    pub comment: T,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CommentsContainer<T> {
    pub comments: T,
}

pub struct CreateCommentRequest {
    pub slug: String,
    pub comment: CommentBody,
}

pub struct DeleteCommentRequest {
    pub slug: String,
    pub id: String,
}

pub struct GetCommentsRequest {
    pub slug: String,
}

pub fn create_comment(
    store: &dyn Store,
    ctx: &Context,
    req: CreateCommentRequest,
) -> Result<CommentContainer<CommentView>, ApiError> {
    let author = loader::principal(store, ctx)?;
    let article = loader::article(store, ctx, &req.slug)?;
    let details = req.comment.validate()?;
    let new_comment = NewComment {
        article_id: article.id,
        user_id: author.id,
        body: details.body,
    };
    ctx.checkpoint()?;
    let comment = store.create_comment(&new_comment)?;
    debug!("user {} commented {} on article {}", author.id, comment.id, article.id);
    Ok(CommentContainer {
        comment: CommentView::new(comment, Profile::from_user(author, false)),
    })
}

pub fn delete_comment(store: &dyn Store, ctx: &Context, req: DeleteCommentRequest) -> Result<(), ApiError> {
    let principal = loader::principal(store, ctx)?;
    let article_id = loader::parse_id(&req.slug, crate::types::Target::Article)?;
    let comment = loader::comment(store, ctx, &req.id)?;
    policy::ensure_contained(&comment, article_id)?;
    policy::ensure_owner(&comment, principal.id)?;
    ctx.checkpoint()?;
    store.delete_comment(comment.id)?;
    debug!("user {} deleted comment {}", principal.id, comment.id);
    Ok(())
}

pub fn get_comments(
    store: &dyn Store,
    ctx: &Context,
    req: GetCommentsRequest,
) -> Result<CommentsContainer<Vec<CommentView>>, ApiError> {
    let viewer = ctx.viewer()?;
    let article = loader::article(store, ctx, &req.slug)?;
    ctx.checkpoint()?;
    let comments = store.comments(article.id)?;
    Ok(CommentsContainer {
        comments: enrich::comments(store, ctx, viewer, comments)?,
    })
}

#[post("/articles/<slug>/comments", format = "json", data = "<details>")]
pub async fn add(
    app: &State<App>,
    ctx: Context,
    slug: String,
    details: Json<CommentContainer<CommentBody>>,
) -> ApiResult<CommentContainer<CommentView>> {
    let req = CreateCommentRequest {
        slug,
        comment: details.into_inner().comment,
    };
    app.run(ctx, move |store, ctx| create_comment(store, ctx, req)).await.map(Json)
}

#[get("/articles/<slug>/comments")]
pub async fn list(app: &State<App>, ctx: Context, slug: String) -> ApiResult<CommentsContainer<Vec<CommentView>>> {
    let req = GetCommentsRequest { slug };
    app.run(ctx, move |store, ctx| get_comments(store, ctx, req)).await.map(Json)
}

#[delete("/articles/<slug>/comments/<id>")]
pub async fn remove(app: &State<App>, ctx: Context, slug: String, id: String) -> ApiResult<()> {
    let req = DeleteCommentRequest { slug, id };
    app.run(ctx, move |store, ctx| delete_comment(store, ctx, req)).await.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CommentStore;
    use crate::testing::{self, Spy};
    use crate::types::Code;

    fn delete_req(slug: &str, id: &str) -> DeleteCommentRequest {
        DeleteCommentRequest {
            slug: slug.into(),
            id: id.into(),
        }
    }

    #[test]
    fn owner_deletes_comment_in_article() {
        let store = testing::seeded();
        store.put_comment(testing::comment(1, 1, 1));
        delete_comment(&store, &Context::for_user(1), delete_req("1", "1")).unwrap();
        assert!(store.comment_by_id(1).is_err());
    }

    #[test]
    fn comment_from_another_article() {
        let store = testing::seeded();
        store.put_comment(testing::comment(1, 2, 1));
        let err = delete_comment(&store, &Context::for_user(1), delete_req("1", "1")).unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert_eq!(err.message(), "the comment is not in the article");
        assert!(store.comment_by_id(1).is_ok());
    }

    #[test]
    fn comment_of_another_user() {
        let store = testing::seeded();
        store.put_comment(testing::comment(1, 1, 2));
        let err = delete_comment(&store, &Context::for_user(1), delete_req("1", "1")).unwrap_err();
        assert!(matches!(err, ApiError::NotOwner));
        assert_eq!(err.code(), Code::PermissionDenied);
        assert!(store.comment_by_id(1).is_ok());
    }

    #[test]
    fn deleted_author_cannot_delete_comment() {
        let store = testing::seeded();
        store.put_comment(testing::comment(1, 1, 99));
        let err = delete_comment(&store, &Context::for_user(99), delete_req("1", "1")).unwrap_err();
        assert!(matches!(err, ApiError::PrincipalNotFound));
        assert!(store.comment_by_id(1).is_ok());
    }

    #[test]
    fn malformed_ids() {
        let store = testing::seeded();
        let ctx = Context::for_user(1);
        let err = delete_comment(&store, &ctx, delete_req("one", "1")).unwrap_err();
        assert_eq!(err.message(), "invalid article id");
        let err = delete_comment(&store, &ctx, delete_req("1", "x")).unwrap_err();
        assert_eq!(err.message(), "invalid comment id");
        let err = delete_comment(&store, &Context::anonymous(), delete_req("1", "1")).unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);
    }

    #[test]
    fn containment_is_checked_for_every_slug() {
        let store = testing::seeded();
        store.put_comment(testing::comment(4, 2, 1));
        for slug in &["1", "3", "77"] {
            let err = delete_comment(&store, &Context::for_user(1), delete_req(slug, "4")).unwrap_err();
            assert!(matches!(err, ApiError::NotContained));
        }
        delete_comment(&store, &Context::for_user(1), delete_req("2", "4")).unwrap();
    }

    #[test]
    fn create_and_list() {
        let store = testing::seeded();
        let ctx = Context::for_user(2);
        let req = CreateCommentRequest {
            slug: "1".into(),
            comment: CommentBody {
                body: "Thank you so much!".into(),
            },
        };
        let created = create_comment(&store, &ctx, req).unwrap().comment;
        assert_eq!(created.author.username, "jane");

        let req = CreateCommentRequest {
            slug: "1".into(),
            comment: CommentBody { body: "  ".into() },
        };
        assert!(matches!(create_comment(&store, &ctx, req), Err(ApiError::Validation(_))));

        crate::relation::follow(&store, &Context::for_user(1), 1, 2).unwrap();
        let listed = get_comments(&store, &Context::for_user(1), GetCommentsRequest { slug: "1".into() })
            .unwrap()
            .comments;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
        assert!(listed[0].author.following);

        let listed = get_comments(&store, &Context::anonymous(), GetCommentsRequest { slug: "1".into() })
            .unwrap()
            .comments;
        assert!(!listed[0].author.following);
    }

    #[test]
    fn comments_of_missing_article() {
        let store = testing::seeded();
        let err = get_comments(&store, &Context::anonymous(), GetCommentsRequest { slug: "42".into() }).unwrap_err();
        assert!(matches!(err, ApiError::TargetNotFound(_)));
    }

    #[test]
    fn list_aborts_on_flag_failure() {
        let spy = Spy::new(testing::seeded()).failing("is_following");
        spy.inner().put_comment(testing::comment(3, 1, 2));
        let err = get_comments(&spy, &Context::for_user(1), GetCommentsRequest { slug: "1".into() }).unwrap_err();
        assert_eq!(err.code(), Code::Aborted);
    }
}
