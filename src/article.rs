use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::debug;
use rocket::serde::json::Json;
use rocket::{delete, get, post, put, State};
use serde_derive::{Deserialize, Serialize};

use crate::app::App;
use crate::auth::{Context, Viewer};
use crate::db::schema::articles;
use crate::db::Store;
use crate::profile::Profile;
use crate::types::{ApiError, ApiResult, Validate, ValidationError};
use crate::utils::{normalize_tags, serialize_date, Pagination};
use crate::{enrich, loader, policy, relation};

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable)]
#[diesel(table_name = articles)]
pub struct Article {
    pub id: i32,
    pub author_id: i32,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    /// Mirrors the favorite edges; only the store's favorite operations move it.
    pub favorites_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn slug(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = articles)]
pub struct NewArticle {
    pub author_id: i32,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleFilter {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: DateTime<Utc>,
    pub favorited: bool,
    pub favorites_count: i64,
    pub author: Profile,
}

impl ArticleView {
    pub fn new(article: Article, author: Profile, favorited: bool) -> Self {
        ArticleView {
            slug: article.slug(),
            title: article.title,
            description: article.description,
            body: article.body,
            tag_list: article.tag_list,
            created_at: article.created_at,
            updated_at: article.updated_at,
            favorited,
            favorites_count: article.favorites_count,
            author,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    pub article: ArticleView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlesResponse {
    pub articles: Vec<ArticleView>,
    pub articles_count: usize,
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDetails {
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(default)]
    pub tag_list: Vec<String>,
}

impl Validate for ArticleDetails {
    fn validate(self) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        if self.title.trim().is_empty() {
            error.add_error("title", "can't be blank");
        }
        if self.description.trim().is_empty() {
            error.add_error("description", "can't be blank");
        }
        if self.body.trim().is_empty() {
            error.add_error("body", "can't be blank");
        }
        error.into_result().map(|_| self)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateArticle {
    pub article: ArticleDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDetails {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub tag_list: Option<Vec<String>>,
}

impl Validate for UpdateDetails {
    fn validate(self) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        let fields = [
            ("title", &self.title),
            ("description", &self.description),
            ("body", &self.body),
        ];
        for (name, value) in fields.iter() {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    error.add_error(*name, "can't be blank");
                }
            }
        }
        error.into_result().map(|_| self)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateArticle {
    pub article: UpdateDetails,
}

pub struct SlugRequest {
    pub slug: String,
}

pub struct UpdateArticleRequest {
    pub slug: String,
    pub article: UpdateDetails,
}

#[derive(Debug, Default)]
pub struct ListArticlesRequest {
    pub filter: ArticleFilter,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Default)]
pub struct FeedRequest {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub fn create_article(store: &dyn Store, ctx: &Context, req: CreateArticle) -> Result<ArticleResponse, ApiError> {
    let author = loader::principal(store, ctx)?;
    let details = req.article.validate()?;
    let new_article = NewArticle {
        author_id: author.id,
        title: details.title,
        description: details.description,
        body: details.body,
        tag_list: normalize_tags(details.tag_list),
    };
    ctx.checkpoint()?;
    let article = store.create_article(&new_article)?;
    debug!("user {} created article {}", author.id, article.id);
    Ok(ArticleResponse {
        article: ArticleView::new(article, Profile::from_user(author, false), false),
    })
}

pub fn get_article(store: &dyn Store, ctx: &Context, req: SlugRequest) -> Result<ArticleResponse, ApiError> {
    let viewer = ctx.viewer()?;
    let article = loader::article(store, ctx, &req.slug)?;
    Ok(ArticleResponse {
        article: enrich::article(store, ctx, viewer, article)?,
    })
}

pub fn get_articles(store: &dyn Store, ctx: &Context, req: ListArticlesRequest) -> Result<ArticlesResponse, ApiError> {
    let viewer = ctx.viewer()?;
    let page = Pagination::new(req.limit, req.offset);
    ctx.checkpoint()?;
    let articles = store.articles(&req.filter, page.limit, page.offset)?;
    let articles = enrich::articles(store, ctx, viewer, articles)?;
    Ok(ArticlesResponse {
        articles_count: articles.len(),
        articles,
    })
}

pub fn get_feed_articles(store: &dyn Store, ctx: &Context, req: FeedRequest) -> Result<ArticlesResponse, ApiError> {
    let current = loader::principal(store, ctx)?;
    let page = Pagination::new(req.limit, req.offset);
    ctx.checkpoint()?;
    let authors = store.following_user_ids(current.id)?;
    let articles = if authors.is_empty() {
        Vec::new()
    } else {
        ctx.checkpoint()?;
        store.feed_articles(&authors, page.limit, page.offset)?
    };
    let articles = enrich::articles(store, ctx, Viewer::User(current.id), articles)?;
    Ok(ArticlesResponse {
        articles_count: articles.len(),
        articles,
    })
}

pub fn update_article(store: &dyn Store, ctx: &Context, req: UpdateArticleRequest) -> Result<ArticleResponse, ApiError> {
    let principal = loader::principal(store, ctx)?;
    let mut article = loader::article(store, ctx, &req.slug)?;
    policy::ensure_owner(&article, principal.id)?;
    let changes = req.article.validate()?;

    if let Some(title) = changes.title {
        article.title = title;
    }
    if let Some(description) = changes.description {
        article.description = description;
    }
    if let Some(body) = changes.body {
        article.body = body;
    }
    if let Some(tag_list) = changes.tag_list {
        article.tag_list = normalize_tags(tag_list);
    }

    ctx.checkpoint()?;
    let article = store.update_article(&article)?;
    Ok(ArticleResponse {
        article: enrich::article(store, ctx, Viewer::User(principal.id), article)?,
    })
}

pub fn delete_article(store: &dyn Store, ctx: &Context, req: SlugRequest) -> Result<(), ApiError> {
    let principal = loader::principal(store, ctx)?;
    let article = loader::article(store, ctx, &req.slug)?;
    policy::ensure_owner(&article, principal.id)?;
    ctx.checkpoint()?;
    store.delete_article(article.id)?;
    debug!("user {} deleted article {}", principal.id, article.id);
    Ok(())
}

pub fn favorite_article(store: &dyn Store, ctx: &Context, req: SlugRequest) -> Result<ArticleResponse, ApiError> {
    let principal = loader::principal(store, ctx)?;
    let article = loader::article(store, ctx, &req.slug)?;
    let state = relation::add_favorite(store, ctx, &article, principal.id)?;
    let view = enrich::article_with_flag(store, ctx, Viewer::User(principal.id), state.article, state.favorited)?;
    Ok(ArticleResponse { article: view })
}

pub fn unfavorite_article(store: &dyn Store, ctx: &Context, req: SlugRequest) -> Result<ArticleResponse, ApiError> {
    let principal = loader::principal(store, ctx)?;
    let article = loader::article(store, ctx, &req.slug)?;
    let state = relation::remove_favorite(store, ctx, &article, principal.id)?;
    let view = enrich::article_with_flag(store, ctx, Viewer::User(principal.id), state.article, state.favorited)?;
    Ok(ArticleResponse { article: view })
}

pub fn get_tags(store: &dyn Store, ctx: &Context) -> Result<TagsResponse, ApiError> {
    ctx.viewer()?;
    ctx.checkpoint()?;
    Ok(TagsResponse { tags: store.tags()? })
}

#[get("/articles?<tag>&<author>&<favorited>&<limit>&<offset>")]
pub async fn list(
    app: &State<App>,
    ctx: Context,
    tag: Option<String>,
    author: Option<String>,
    favorited: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> ApiResult<ArticlesResponse> {
    let req = ListArticlesRequest {
        filter: ArticleFilter {
            tag,
            author,
            favorited,
        },
        limit,
        offset,
    };
    app.run(ctx, move |store, ctx| get_articles(store, ctx, req)).await.map(Json)
}

#[get("/articles/feed?<limit>&<offset>")]
pub async fn feed(app: &State<App>, ctx: Context, limit: Option<i64>, offset: Option<i64>) -> ApiResult<ArticlesResponse> {
    let req = FeedRequest { limit, offset };
    app.run(ctx, move |store, ctx| get_feed_articles(store, ctx, req)).await.map(Json)
}

#[get("/articles/<slug>")]
pub async fn show(app: &State<App>, ctx: Context, slug: String) -> ApiResult<ArticleResponse> {
    let req = SlugRequest { slug };
    app.run(ctx, move |store, ctx| get_article(store, ctx, req)).await.map(Json)
}

#[post("/articles", format = "json", data = "<create>")]
pub async fn create(app: &State<App>, ctx: Context, create: Json<CreateArticle>) -> ApiResult<ArticleResponse> {
    let req = create.into_inner();
    app.run(ctx, move |store, ctx| create_article(store, ctx, req)).await.map(Json)
}

#[put("/articles/<slug>", format = "json", data = "<update>")]
pub async fn update(
    app: &State<App>,
    ctx: Context,
    slug: String,
    update: Json<UpdateArticle>,
) -> ApiResult<ArticleResponse> {
    let req = UpdateArticleRequest {
        slug,
        article: update.into_inner().article,
    };
    app.run(ctx, move |store, ctx| update_article(store, ctx, req)).await.map(Json)
}

#[delete("/articles/<slug>")]
pub async fn remove(app: &State<App>, ctx: Context, slug: String) -> ApiResult<()> {
    let req = SlugRequest { slug };
    app.run(ctx, move |store, ctx| delete_article(store, ctx, req)).await.map(Json)
}

#[post("/articles/<slug>/favorite")]
pub async fn favorite(app: &State<App>, ctx: Context, slug: String) -> ApiResult<ArticleResponse> {
    let req = SlugRequest { slug };
    app.run(ctx, move |store, ctx| favorite_article(store, ctx, req)).await.map(Json)
}

#[delete("/articles/<slug>/favorite")]
pub async fn unfavorite(app: &State<App>, ctx: Context, slug: String) -> ApiResult<ArticleResponse> {
    let req = SlugRequest { slug };
    app.run(ctx, move |store, ctx| unfavorite_article(store, ctx, req)).await.map(Json)
}

#[get("/tags")]
pub async fn tags(app: &State<App>, ctx: Context) -> ApiResult<TagsResponse> {
    app.run(ctx, |store, ctx| get_tags(store, ctx)).await.map(Json)
}
