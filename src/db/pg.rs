use std::collections::BTreeSet;

use chrono::Utc;
use diesel::dsl::{exists, select};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};

use super::schema::{articles, comments, favorites, follows, users};
use super::{ArticleStore, CommentStore, StoreError, StoreResult, UserStore};
use crate::article::{Article, ArticleFilter, NewArticle};
use crate::comment::{Comment, NewComment};
use crate::users::models::{NewUser, User};

// An alias to the type for a pool of Diesel Postgres connections.
pub type PgPool = Pool<ConnectionManager<PgConnection>>;

type PooledPg = PooledConnection<ConnectionManager<PgConnection>>;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    fn conn(&self) -> StoreResult<PooledPg> {
        Ok(self.pool.get()?)
    }
}

fn user_id_by_name(conn: &mut PooledPg, username: &str) -> StoreResult<Option<i32>> {
    Ok(users::table
        .filter(users::username.eq(username))
        .select(users::id)
        .first::<i32>(conn)
        .optional()?)
}

impl UserStore for PgStore {
    fn user_by_id(&self, id: i32) -> StoreResult<User> {
        let mut conn = self.conn()?;
        Ok(users::table.find(id).first::<User>(&mut conn)?)
    }

    fn user_by_username(&self, username: &str) -> StoreResult<User> {
        let mut conn = self.conn()?;
        Ok(users::table
            .filter(users::username.eq(username))
            .first::<User>(&mut conn)?)
    }

    fn user_by_email(&self, email: &str) -> StoreResult<User> {
        let mut conn = self.conn()?;
        Ok(users::table.filter(users::email.eq(email)).first::<User>(&mut conn)?)
    }

    fn username_taken(&self, username: &str, except: Option<i32>) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let holders = users::table
            .filter(users::username.eq(username))
            .select(users::id)
            .load::<i32>(&mut conn)?;
        Ok(holders.into_iter().any(|id| Some(id) != except))
    }

    fn email_taken(&self, email: &str, except: Option<i32>) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let holders = users::table
            .filter(users::email.eq(email))
            .select(users::id)
            .load::<i32>(&mut conn)?;
        Ok(holders.into_iter().any(|id| Some(id) != except))
    }

    fn create_user(&self, new_user: &NewUser) -> StoreResult<User> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(users::table)
            .values(new_user)
            .get_result::<User>(&mut conn)?)
    }

    fn update_user(&self, user: &User) -> StoreResult<User> {
        let mut conn = self.conn()?;
        Ok(diesel::update(users::table.find(user.id))
            .set((
                users::username.eq(&user.username),
                users::email.eq(&user.email),
                users::password.eq(&user.password),
                users::bio.eq(&user.bio),
                users::image.eq(&user.image),
            ))
            .get_result::<User>(&mut conn)?)
    }

    fn follow(&self, follower_id: i32, followee_id: i32) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::insert_into(follows::table)
            .values((
                follows::follower_id.eq(follower_id),
                follows::followee_id.eq(followee_id),
            ))
            .on_conflict_do_nothing()
            .execute(&mut conn)?;
        Ok(())
    }

    fn unfollow(&self, follower_id: i32, followee_id: i32) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::delete(follows::table.find((follower_id, followee_id))).execute(&mut conn)?;
        Ok(())
    }

    fn is_following(&self, follower_id: i32, followee_id: i32) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        Ok(select(exists(follows::table.find((follower_id, followee_id)))).get_result::<bool>(&mut conn)?)
    }

    fn following_user_ids(&self, follower_id: i32) -> StoreResult<Vec<i32>> {
        let mut conn = self.conn()?;
        Ok(follows::table
            .filter(follows::follower_id.eq(follower_id))
            .select(follows::followee_id)
            .order(follows::followee_id)
            .load::<i32>(&mut conn)?)
    }
}

impl ArticleStore for PgStore {
    fn article_by_id(&self, id: i32) -> StoreResult<Article> {
        let mut conn = self.conn()?;
        Ok(articles::table.find(id).first::<Article>(&mut conn)?)
    }

    fn create_article(&self, new_article: &NewArticle) -> StoreResult<Article> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(articles::table)
            .values(new_article)
            .get_result::<Article>(&mut conn)?)
    }

    fn update_article(&self, article: &Article) -> StoreResult<Article> {
        let mut conn = self.conn()?;
        Ok(diesel::update(articles::table.find(article.id))
            .set((
                articles::title.eq(&article.title),
                articles::description.eq(&article.description),
                articles::body.eq(&article.body),
                articles::tag_list.eq(&article.tag_list),
                articles::updated_at.eq(Utc::now()),
            ))
            .get_result::<Article>(&mut conn)?)
    }

    fn delete_article(&self, id: i32) -> StoreResult<()> {
        let mut conn = self.conn()?;
        conn.transaction::<_, StoreError, _>(|conn| {
            diesel::delete(comments::table.filter(comments::article_id.eq(id))).execute(conn)?;
            diesel::delete(favorites::table.filter(favorites::article_id.eq(id))).execute(conn)?;
            match diesel::delete(articles::table.find(id)).execute(conn)? {
                0 => Err(StoreError::NotFound),
                _ => Ok(()),
            }
        })
    }

    fn add_favorite(&self, article_id: i32, user_id: i32) -> StoreResult<Article> {
        let mut conn = self.conn()?;
        conn.transaction::<_, StoreError, _>(|conn| {
            // row lock serializes counter updates on the same article
            let article = articles::table
                .find(article_id)
                .for_update()
                .get_result::<Article>(conn)?;
            let inserted = diesel::insert_into(favorites::table)
                .values((favorites::article_id.eq(article_id), favorites::user_id.eq(user_id)))
                .on_conflict_do_nothing()
                .execute(conn)?;
            if inserted == 0 {
                return Ok(article);
            }
            Ok(diesel::update(articles::table.find(article_id))
                .set(articles::favorites_count.eq(articles::favorites_count + 1))
                .get_result::<Article>(conn)?)
        })
    }

    fn delete_favorite(&self, article_id: i32, user_id: i32) -> StoreResult<Article> {
        let mut conn = self.conn()?;
        conn.transaction::<_, StoreError, _>(|conn| {
            let article = articles::table
                .find(article_id)
                .for_update()
                .get_result::<Article>(conn)?;
            let removed = diesel::delete(favorites::table.find((article_id, user_id))).execute(conn)?;
            if removed == 0 {
                return Ok(article);
            }
            let count = (article.favorites_count - 1).max(0);
            Ok(diesel::update(articles::table.find(article_id))
                .set(articles::favorites_count.eq(count))
                .get_result::<Article>(conn)?)
        })
    }

    fn is_favorited(&self, article_id: i32, user_id: i32) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        Ok(select(exists(favorites::table.find((article_id, user_id)))).get_result::<bool>(&mut conn)?)
    }

    fn articles(&self, filter: &ArticleFilter, limit: i64, offset: i64) -> StoreResult<Vec<Article>> {
        let mut conn = self.conn()?;
        let mut query = articles::table.into_boxed();

        if let Some(tag) = &filter.tag {
            query = query.filter(articles::tag_list.contains(vec![tag.clone()]));
        }
        if let Some(author) = &filter.author {
            match user_id_by_name(&mut conn, author)? {
                Some(id) => query = query.filter(articles::author_id.eq(id)),
                None => return Ok(Vec::new()),
            }
        }
        if let Some(favorited) = &filter.favorited {
            let user_id = match user_id_by_name(&mut conn, favorited)? {
                Some(id) => id,
                None => return Ok(Vec::new()),
            };
            let ids = favorites::table
                .filter(favorites::user_id.eq(user_id))
                .select(favorites::article_id)
                .load::<i32>(&mut conn)?;
            query = query.filter(articles::id.eq_any(ids));
        }

        Ok(query
            .order(articles::id.desc())
            .limit(limit)
            .offset(offset)
            .load::<Article>(&mut conn)?)
    }

    fn feed_articles(&self, author_ids: &[i32], limit: i64, offset: i64) -> StoreResult<Vec<Article>> {
        let mut conn = self.conn()?;
        Ok(articles::table
            .filter(articles::author_id.eq_any(author_ids.to_vec()))
            .order(articles::id.desc())
            .limit(limit)
            .offset(offset)
            .load::<Article>(&mut conn)?)
    }

    fn tags(&self) -> StoreResult<Vec<String>> {
        let mut conn = self.conn()?;
        let lists = articles::table
            .select(articles::tag_list)
            .load::<Vec<String>>(&mut conn)?;
        let tags: BTreeSet<String> = lists.into_iter().flatten().collect();
        Ok(tags.into_iter().collect())
    }
}

impl CommentStore for PgStore {
    fn comment_by_id(&self, id: i32) -> StoreResult<Comment> {
        let mut conn = self.conn()?;
        Ok(comments::table.find(id).first::<Comment>(&mut conn)?)
    }

    fn create_comment(&self, new_comment: &NewComment) -> StoreResult<Comment> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(comments::table)
            .values(new_comment)
            .get_result::<Comment>(&mut conn)?)
    }

    fn delete_comment(&self, id: i32) -> StoreResult<()> {
        let mut conn = self.conn()?;
        match diesel::delete(comments::table.find(id)).execute(&mut conn)? {
            0 => Err(StoreError::NotFound),
            _ => Ok(()),
        }
    }

    fn comments(&self, article_id: i32) -> StoreResult<Vec<Comment>> {
        let mut conn = self.conn()?;
        Ok(comments::table
            .filter(comments::article_id.eq(article_id))
            .order((comments::created_at.asc(), comments::id.asc()))
            .load::<Comment>(&mut conn)?)
    }
}
