//! Fixtures shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{Duration, TimeZone, Utc};

use crate::article::{Article, ArticleFilter, NewArticle};
use crate::comment::{Comment, NewComment};
use crate::db::{ArticleStore, CommentStore, MemoryStore, Store, StoreError, StoreResult, UserStore};
use crate::users::models::{NewUser, User};

pub fn user(id: i32, username: &str) -> User {
    User {
        id,
        username: username.to_owned(),
        email: format!("{}@{}.{}", username, username, username),
        password: User::make_password(username).unwrap(),
        bio: None,
        image: None,
    }
}

pub fn article(id: i32, author_id: i32) -> Article {
    let created = Utc.with_ymd_and_hms(2016, 2, 18, 3, 22, 56).unwrap() + Duration::minutes(id as i64);
    Article {
        id,
        author_id,
        title: format!("Article {}", id),
        description: "Ever wonder how?".to_owned(),
        body: "It takes a Jacobian".to_owned(),
        tag_list: Vec::new(),
        favorites_count: 0,
        created_at: created,
        updated_at: created,
    }
}

pub fn comment(id: i32, article_id: i32, user_id: i32) -> Comment {
    let created = Utc.with_ymd_and_hms(2016, 2, 18, 3, 22, 56).unwrap() + Duration::seconds(id as i64);
    Comment {
        id,
        article_id,
        user_id,
        body: "It takes a Jacobian".to_owned(),
        created_at: created,
        updated_at: created,
    }
}

/// jake (1), jane (2) and bob (3); article 1 by jake, article 2 by jane.
/// No follows, favorites or comments.
pub fn seeded() -> MemoryStore {
    let store = MemoryStore::new();

    let mut jake = user(1, "jake");
    jake.password = User::make_password("jakejake").unwrap();
    jake.image = Some("https://i.stack.imgur.com/xHWG8.jpg".to_owned());
    store.put_user(jake);

    let mut jane = user(2, "jane");
    jane.bio = Some("I work at statefarm".to_owned());
    store.put_user(jane);

    store.put_user(user(3, "bob"));

    let mut dragons = article(1, 1);
    dragons.title = "How to train your dragon".to_owned();
    dragons.tag_list = vec!["dragons".to_owned(), "training".to_owned()];
    store.put_article(dragons);

    let mut borrowck = article(2, 2);
    borrowck.title = "Fighting the borrow checker".to_owned();
    borrowck.tag_list = vec!["rust".to_owned()];
    store.put_article(borrowck);

    store
}

/// Wraps a store, counting calls per method and failing the ones named
/// with `failing`.
pub struct Spy<S> {
    inner: S,
    failing: HashSet<&'static str>,
    calls: Mutex<HashMap<&'static str, usize>>,
    last_page: Mutex<Option<(i64, i64)>>,
}

impl<S: Store> Spy<S> {
    pub fn new(inner: S) -> Self {
        Spy {
            inner,
            failing: HashSet::new(),
            calls: Mutex::new(HashMap::new()),
            last_page: Mutex::new(None),
        }
    }

    pub fn failing(mut self, method: &'static str) -> Self {
        self.failing.insert(method);
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    /// `(limit, offset)` of the latest list or feed query.
    pub fn last_page(&self) -> Option<(i64, i64)> {
        *self.last_page.lock().unwrap()
    }

    fn hit(&self, method: &'static str) -> StoreResult<()> {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;
        if self.failing.contains(method) {
            Err(StoreError::Backend("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

impl<S: Store> UserStore for Spy<S> {
    fn user_by_id(&self, id: i32) -> StoreResult<User> {
        self.hit("user_by_id")?;
        self.inner.user_by_id(id)
    }

    fn user_by_username(&self, username: &str) -> StoreResult<User> {
        self.hit("user_by_username")?;
        self.inner.user_by_username(username)
    }

    fn user_by_email(&self, email: &str) -> StoreResult<User> {
        self.hit("user_by_email")?;
        self.inner.user_by_email(email)
    }

    fn username_taken(&self, username: &str, except: Option<i32>) -> StoreResult<bool> {
        self.hit("username_taken")?;
        self.inner.username_taken(username, except)
    }

    fn email_taken(&self, email: &str, except: Option<i32>) -> StoreResult<bool> {
        self.hit("email_taken")?;
        self.inner.email_taken(email, except)
    }

    fn create_user(&self, new_user: &NewUser) -> StoreResult<User> {
        self.hit("create_user")?;
        self.inner.create_user(new_user)
    }

    fn update_user(&self, user: &User) -> StoreResult<User> {
        self.hit("update_user")?;
        self.inner.update_user(user)
    }

    fn follow(&self, follower_id: i32, followee_id: i32) -> StoreResult<()> {
        self.hit("follow")?;
        self.inner.follow(follower_id, followee_id)
    }

    fn unfollow(&self, follower_id: i32, followee_id: i32) -> StoreResult<()> {
        self.hit("unfollow")?;
        self.inner.unfollow(follower_id, followee_id)
    }

    fn is_following(&self, follower_id: i32, followee_id: i32) -> StoreResult<bool> {
        self.hit("is_following")?;
        self.inner.is_following(follower_id, followee_id)
    }

    fn following_user_ids(&self, follower_id: i32) -> StoreResult<Vec<i32>> {
        self.hit("following_user_ids")?;
        self.inner.following_user_ids(follower_id)
    }
}

impl<S: Store> ArticleStore for Spy<S> {
    fn article_by_id(&self, id: i32) -> StoreResult<Article> {
        self.hit("article_by_id")?;
        self.inner.article_by_id(id)
    }

    fn create_article(&self, new_article: &NewArticle) -> StoreResult<Article> {
        self.hit("create_article")?;
        self.inner.create_article(new_article)
    }

    fn update_article(&self, article: &Article) -> StoreResult<Article> {
        self.hit("update_article")?;
        self.inner.update_article(article)
    }

    fn delete_article(&self, id: i32) -> StoreResult<()> {
        self.hit("delete_article")?;
        self.inner.delete_article(id)
    }

    fn add_favorite(&self, article_id: i32, user_id: i32) -> StoreResult<Article> {
        self.hit("add_favorite")?;
        self.inner.add_favorite(article_id, user_id)
    }

    fn delete_favorite(&self, article_id: i32, user_id: i32) -> StoreResult<Article> {
        self.hit("delete_favorite")?;
        self.inner.delete_favorite(article_id, user_id)
    }

    fn is_favorited(&self, article_id: i32, user_id: i32) -> StoreResult<bool> {
        self.hit("is_favorited")?;
        self.inner.is_favorited(article_id, user_id)
    }

    fn articles(&self, filter: &ArticleFilter, limit: i64, offset: i64) -> StoreResult<Vec<Article>> {
        self.hit("articles")?;
        *self.last_page.lock().unwrap() = Some((limit, offset));
        self.inner.articles(filter, limit, offset)
    }

    fn feed_articles(&self, author_ids: &[i32], limit: i64, offset: i64) -> StoreResult<Vec<Article>> {
        self.hit("feed_articles")?;
        *self.last_page.lock().unwrap() = Some((limit, offset));
        self.inner.feed_articles(author_ids, limit, offset)
    }

    fn tags(&self) -> StoreResult<Vec<String>> {
        self.hit("tags")?;
        self.inner.tags()
    }
}

impl<S: Store> CommentStore for Spy<S> {
    fn comment_by_id(&self, id: i32) -> StoreResult<Comment> {
        self.hit("comment_by_id")?;
        self.inner.comment_by_id(id)
    }

    fn create_comment(&self, new_comment: &NewComment) -> StoreResult<Comment> {
        self.hit("create_comment")?;
        self.inner.create_comment(new_comment)
    }

    fn delete_comment(&self, id: i32) -> StoreResult<()> {
        self.hit("delete_comment")?;
        self.inner.delete_comment(id)
    }

    fn comments(&self, article_id: i32) -> StoreResult<Vec<Comment>> {
        self.hit("comments")?;
        self.inner.comments(article_id)
    }
}
