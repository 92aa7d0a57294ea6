use std::fmt;

use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::article::{Article, ArticleFilter, NewArticle};
use crate::comment::{Comment, NewComment};
use crate::users::models::{NewUser, User};

pub mod memory;
pub mod pg;
pub mod schema;

pub use self::memory::MemoryStore;
pub use self::pg::PgStore;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    NotFound,
    Conflict(String),
    Cancelled,
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "record not found"),
            StoreError::Conflict(what) => write!(f, "conflict: {}", what),
            StoreError::Cancelled => write!(f, "cancelled"),
            StoreError::Backend(cause) => write!(f, "backend: {}", cause),
        }
    }
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> StoreError {
        match err {
            DieselError::NotFound => StoreError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Conflict(info.message().to_owned())
            }
            // a referenced user or article is gone
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => StoreError::NotFound,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> StoreError {
        StoreError::Backend(err.to_string())
    }
}

pub trait UserStore: Send + Sync {
    fn user_by_id(&self, id: i32) -> StoreResult<User>;
    fn user_by_username(&self, username: &str) -> StoreResult<User>;
    fn user_by_email(&self, email: &str) -> StoreResult<User>;
    /// Whether another user (not `except`) already holds the username.
    fn username_taken(&self, username: &str, except: Option<i32>) -> StoreResult<bool>;
    fn email_taken(&self, email: &str, except: Option<i32>) -> StoreResult<bool>;
    fn create_user(&self, new_user: &NewUser) -> StoreResult<User>;
    fn update_user(&self, user: &User) -> StoreResult<User>;

    /// Inserts the follower -> followee edge if it is absent.
    fn follow(&self, follower_id: i32, followee_id: i32) -> StoreResult<()>;
    /// Removes the follower -> followee edge if it is present.
    fn unfollow(&self, follower_id: i32, followee_id: i32) -> StoreResult<()>;
    fn is_following(&self, follower_id: i32, followee_id: i32) -> StoreResult<bool>;
    fn following_user_ids(&self, follower_id: i32) -> StoreResult<Vec<i32>>;
}

pub trait ArticleStore: Send + Sync {
    fn article_by_id(&self, id: i32) -> StoreResult<Article>;
    fn create_article(&self, new_article: &NewArticle) -> StoreResult<Article>;
    fn update_article(&self, article: &Article) -> StoreResult<Article>;
    /// Deletes the article together with its comments and favorite edges.
    fn delete_article(&self, id: i32) -> StoreResult<()>;

    /// Inserts the favorite edge and bumps `favorites_count` in one unit of
    /// work. Re-favoriting leaves the count alone.
    fn add_favorite(&self, article_id: i32, user_id: i32) -> StoreResult<Article>;
    /// Removes the favorite edge and decrements `favorites_count` (never
    /// below zero) in one unit of work. Missing edges are a no-op.
    fn delete_favorite(&self, article_id: i32, user_id: i32) -> StoreResult<Article>;
    fn is_favorited(&self, article_id: i32, user_id: i32) -> StoreResult<bool>;

    fn articles(&self, filter: &ArticleFilter, limit: i64, offset: i64) -> StoreResult<Vec<Article>>;
    fn feed_articles(&self, author_ids: &[i32], limit: i64, offset: i64) -> StoreResult<Vec<Article>>;
    fn tags(&self) -> StoreResult<Vec<String>>;
}

pub trait CommentStore: Send + Sync {
    fn comment_by_id(&self, id: i32) -> StoreResult<Comment>;
    fn create_comment(&self, new_comment: &NewComment) -> StoreResult<Comment>;
    fn delete_comment(&self, id: i32) -> StoreResult<()>;
    /// Comments of one article, oldest first.
    fn comments(&self, article_id: i32) -> StoreResult<Vec<Comment>>;
}

pub trait Store: UserStore + ArticleStore + CommentStore {}

impl<T: UserStore + ArticleStore + CommentStore> Store for T {}
