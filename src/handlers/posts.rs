/// Post handlers - HTTP endpoints for post operations
use crate::config::Config;
use crate::error::Result;
use crate::handlers::ListQuery;
use crate::services::posts::{CreatePostRequest, PostListParams, UpdatePostRequest};
use crate::services::PostService;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

fn service(pool: &web::Data<PgPool>, config: &web::Data<Config>) -> PostService {
    PostService::new(pool.get_ref().clone(), config.comments.count_replies)
}

/// List posts with pagination metadata
pub async fn index(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse> {
    let params = PostListParams {
        page: query.page(),
        per_page: query.per_page(&config.pagination),
        order_by: query.order_by.clone(),
        order_type: query.order_type.clone(),
    };

    let (posts, meta) = service(&pool, &config).list(&params).await?;
    let pagination = match meta {
        Some(meta) => serde_json::to_value(meta)?,
        None => serde_json::json!({}),
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "posts": posts,
        "pagination": pagination,
    })))
}

/// Get a single post with its comment tree
pub async fn show(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let post = service(&pool, &config).get(*post_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "post": post })))
}

/// Create a post
pub async fn create(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: web::Json<CreatePostRequest>,
) -> Result<HttpResponse> {
    let post = service(&pool, &config).create(&req).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({ "post": post })))
}

/// Update a post
pub async fn update(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    post_id: web::Path<i64>,
    req: web::Json<UpdatePostRequest>,
) -> Result<HttpResponse> {
    let post = service(&pool, &config).update(*post_id, &req).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "post": post })))
}

/// Destroy a post and its comment tree
pub async fn destroy(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    service(&pool, &config).destroy(*post_id).await?;

    Ok(HttpResponse::NoContent().finish())
}
