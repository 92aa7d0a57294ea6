//! Process-local store. One lock guards everything, so each call is a single
//! atomic unit, the same guarantee a transaction gives the PostgreSQL store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use super::{ArticleStore, CommentStore, StoreError, StoreResult, UserStore};
use crate::article::{Article, ArticleFilter, NewArticle};
use crate::comment::{Comment, NewComment};
use crate::users::models::{NewUser, User};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    articles: BTreeMap<i32, Article>,
    comments: BTreeMap<i32, Comment>,
    /// (article_id, user_id)
    favorites: BTreeSet<(i32, i32)>,
    /// (follower_id, followee_id)
    follows: BTreeSet<(i32, i32)>,
    last_user: i32,
    last_article: i32,
    last_comment: i32,
}

impl Tables {
    fn user_id_by_name(&self, username: &str) -> Option<i32> {
        self.users.values().find(|u| u.username == username).map(|u| u.id)
    }

    fn page(articles: Vec<&Article>, limit: i64, offset: i64) -> Vec<Article> {
        articles
            .into_iter()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }
}

impl UserStore for MemoryStore {
    fn user_by_id(&self, id: i32) -> StoreResult<User> {
        self.lock()?.users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn user_by_username(&self, username: &str) -> StoreResult<User> {
        let tables = self.lock()?;
        let found = tables.users.values().find(|u| u.username == username);
        found.cloned().ok_or(StoreError::NotFound)
    }

    fn user_by_email(&self, email: &str) -> StoreResult<User> {
        let tables = self.lock()?;
        let found = tables.users.values().find(|u| u.email == email);
        found.cloned().ok_or(StoreError::NotFound)
    }

    fn username_taken(&self, username: &str, except: Option<i32>) -> StoreResult<bool> {
        let tables = self.lock()?;
        Ok(tables
            .users
            .values()
            .any(|u| u.username == username && Some(u.id) != except))
    }

    fn email_taken(&self, email: &str, except: Option<i32>) -> StoreResult<bool> {
        let tables = self.lock()?;
        Ok(tables.users.values().any(|u| u.email == email && Some(u.id) != except))
    }

    fn create_user(&self, new_user: &NewUser) -> StoreResult<User> {
        let mut tables = self.lock()?;
        if tables
            .users
            .values()
            .any(|u| u.username == new_user.username || u.email == new_user.email)
        {
            return Err(StoreError::Conflict("users".into()));
        }
        tables.last_user += 1;
        let user = User {
            id: tables.last_user,
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            password: new_user.password.clone(),
            bio: None,
            image: None,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn update_user(&self, user: &User) -> StoreResult<User> {
        let mut tables = self.lock()?;
        if tables
            .users
            .values()
            .any(|u| u.id != user.id && (u.username == user.username || u.email == user.email))
        {
            return Err(StoreError::Conflict("users".into()));
        }
        match tables.users.get_mut(&user.id) {
            Some(stored) => {
                *stored = user.clone();
                Ok(stored.clone())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn follow(&self, follower_id: i32, followee_id: i32) -> StoreResult<()> {
        let mut tables = self.lock()?;
        if !tables.users.contains_key(&follower_id) || !tables.users.contains_key(&followee_id) {
            return Err(StoreError::NotFound);
        }
        tables.follows.insert((follower_id, followee_id));
        Ok(())
    }

    fn unfollow(&self, follower_id: i32, followee_id: i32) -> StoreResult<()> {
        self.lock()?.follows.remove(&(follower_id, followee_id));
        Ok(())
    }

    fn is_following(&self, follower_id: i32, followee_id: i32) -> StoreResult<bool> {
        Ok(self.lock()?.follows.contains(&(follower_id, followee_id)))
    }

    fn following_user_ids(&self, follower_id: i32) -> StoreResult<Vec<i32>> {
        let tables = self.lock()?;
        Ok(tables
            .follows
            .range((follower_id, i32::MIN)..=(follower_id, i32::MAX))
            .map(|&(_, followee)| followee)
            .collect())
    }
}

impl ArticleStore for MemoryStore {
    fn article_by_id(&self, id: i32) -> StoreResult<Article> {
        self.lock()?.articles.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn create_article(&self, new_article: &NewArticle) -> StoreResult<Article> {
        let mut tables = self.lock()?;
        if !tables.users.contains_key(&new_article.author_id) {
            return Err(StoreError::NotFound);
        }
        tables.last_article += 1;
        let now = Utc::now();
        let article = Article {
            id: tables.last_article,
            author_id: new_article.author_id,
            title: new_article.title.clone(),
            description: new_article.description.clone(),
            body: new_article.body.clone(),
            tag_list: new_article.tag_list.clone(),
            favorites_count: 0,
            created_at: now,
            updated_at: now,
        };
        tables.articles.insert(article.id, article.clone());
        Ok(article)
    }

    fn update_article(&self, article: &Article) -> StoreResult<Article> {
        let mut tables = self.lock()?;
        let stored = tables.articles.get_mut(&article.id).ok_or(StoreError::NotFound)?;
        stored.title = article.title.clone();
        stored.description = article.description.clone();
        stored.body = article.body.clone();
        stored.tag_list = article.tag_list.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    fn delete_article(&self, id: i32) -> StoreResult<()> {
        let mut tables = self.lock()?;
        if tables.articles.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.comments.retain(|_, c| c.article_id != id);
        tables.favorites.retain(|&(article_id, _)| article_id != id);
        Ok(())
    }

    fn add_favorite(&self, article_id: i32, user_id: i32) -> StoreResult<Article> {
        let mut tables = self.lock()?;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        if !tables.articles.contains_key(&article_id) {
            return Err(StoreError::NotFound);
        }
        let inserted = tables.favorites.insert((article_id, user_id));
        let article = tables.articles.get_mut(&article_id).ok_or(StoreError::NotFound)?;
        if inserted {
            article.favorites_count += 1;
        }
        Ok(article.clone())
    }

    fn delete_favorite(&self, article_id: i32, user_id: i32) -> StoreResult<Article> {
        let mut tables = self.lock()?;
        if !tables.articles.contains_key(&article_id) {
            return Err(StoreError::NotFound);
        }
        let removed = tables.favorites.remove(&(article_id, user_id));
        let article = tables.articles.get_mut(&article_id).ok_or(StoreError::NotFound)?;
        if removed {
            article.favorites_count = (article.favorites_count - 1).max(0);
        }
        Ok(article.clone())
    }

    fn is_favorited(&self, article_id: i32, user_id: i32) -> StoreResult<bool> {
        Ok(self.lock()?.favorites.contains(&(article_id, user_id)))
    }

    fn articles(&self, filter: &ArticleFilter, limit: i64, offset: i64) -> StoreResult<Vec<Article>> {
        let tables = self.lock()?;
        let author = match &filter.author {
            Some(name) => match tables.user_id_by_name(name) {
                Some(id) => Some(id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let favorited_by = match &filter.favorited {
            Some(name) => match tables.user_id_by_name(name) {
                Some(id) => Some(id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let matching = tables
            .articles
            .values()
            .filter(|a| filter.tag.as_ref().map_or(true, |tag| a.tag_list.contains(tag)))
            .filter(|a| author.map_or(true, |id| a.author_id == id))
            .filter(|a| favorited_by.map_or(true, |id| tables.favorites.contains(&(a.id, id))))
            .collect();
        Ok(Tables::page(matching, limit, offset))
    }

    fn feed_articles(&self, author_ids: &[i32], limit: i64, offset: i64) -> StoreResult<Vec<Article>> {
        let tables = self.lock()?;
        let matching = tables
            .articles
            .values()
            .filter(|a| author_ids.contains(&a.author_id))
            .collect();
        Ok(Tables::page(matching, limit, offset))
    }

    fn tags(&self) -> StoreResult<Vec<String>> {
        let tables = self.lock()?;
        let tags: BTreeSet<&String> = tables.articles.values().flat_map(|a| a.tag_list.iter()).collect();
        Ok(tags.into_iter().cloned().collect())
    }
}

impl CommentStore for MemoryStore {
    fn comment_by_id(&self, id: i32) -> StoreResult<Comment> {
        self.lock()?.comments.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn create_comment(&self, new_comment: &NewComment) -> StoreResult<Comment> {
        let mut tables = self.lock()?;
        if !tables.articles.contains_key(&new_comment.article_id) {
            return Err(StoreError::NotFound);
        }
        tables.last_comment += 1;
        let now = Utc::now();
        let comment = Comment {
            id: tables.last_comment,
            article_id: new_comment.article_id,
            user_id: new_comment.user_id,
            body: new_comment.body.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    fn delete_comment(&self, id: i32) -> StoreResult<()> {
        match self.lock()?.comments.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    fn comments(&self, article_id: i32) -> StoreResult<Vec<Comment>> {
        let tables = self.lock()?;
        Ok(tables
            .comments
            .values()
            .filter(|c| c.article_id == article_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
impl MemoryStore {
    pub fn put_user(&self, user: User) -> User {
        let mut tables = self.tables.lock().unwrap();
        tables.last_user = tables.last_user.max(user.id);
        tables.users.insert(user.id, user.clone());
        user
    }

    pub fn put_article(&self, article: Article) -> Article {
        let mut tables = self.tables.lock().unwrap();
        tables.last_article = tables.last_article.max(article.id);
        tables.articles.insert(article.id, article.clone());
        article
    }

    /// Stores the comment as given, whether or not its article exists.
    pub fn put_comment(&self, comment: Comment) -> Comment {
        let mut tables = self.tables.lock().unwrap();
        tables.last_comment = tables.last_comment.max(comment.id);
        tables.comments.insert(comment.id, comment.clone());
        comment
    }
}
