/// Comment handlers - HTTP endpoints for comment operations
use crate::config::Config;
use crate::error::Result;
use crate::handlers::ListQuery;
use crate::services::comments::{
    CommentListParams, CreateCommentRequest, UpdateCommentRequest,
};
use crate::services::CommentService;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

fn service(pool: &web::Data<PgPool>, config: &web::Data<Config>) -> CommentService {
    CommentService::new(pool.get_ref().clone(), config.comments.count_replies)
}

/// List top-level comments (optionally scoped to a post) with their replies
/// and pagination metadata
pub async fn index(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse> {
    let params = CommentListParams {
        post_id: query.post_id,
        page: query.page(),
        per_page: query.per_page(&config.pagination),
        order_by: query.order_by.clone(),
        order_type: query.order_type.clone(),
    };

    let (comments, meta) = service(&pool, &config).list(&params).await?;
    let pagination = match meta {
        Some(meta) => serde_json::to_value(meta)?,
        None => serde_json::json!({}),
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "comments": comments,
        "pagination": pagination,
    })))
}

/// Get a single comment with its replies and owning post
pub async fn show(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    comment_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let (comment, post) = service(&pool, &config).get(*comment_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "comment": comment, "post": post })))
}

/// Create a comment (top-level or reply)
pub async fn create(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    req: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse> {
    let (comment, post) = service(&pool, &config).create(&req).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({ "comment": comment, "post": post })))
}

/// Update a comment, including batched reply writes
pub async fn update(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    comment_id: web::Path<i64>,
    req: web::Json<UpdateCommentRequest>,
) -> Result<HttpResponse> {
    let (comment, post) = service(&pool, &config).update(*comment_id, &req).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "comment": comment, "post": post })))
}

/// Destroy a comment and its reply subtree
pub async fn destroy(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    comment_id: web::Path<i64>,
) -> Result<HttpResponse> {
    service(&pool, &config).destroy(*comment_id).await?;

    Ok(HttpResponse::NoContent().finish())
}
