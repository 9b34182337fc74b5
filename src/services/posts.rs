/// Post service - CRUD, nested comment payloads, and paginated listing
use crate::db::{comment_repo, post_repo};
use crate::error::{AppError, Result};
use crate::models::{Post, PostDetail};
use crate::ordering::{Ordering, PostSortColumn};
use crate::pagination::{self, PaginationMeta};
use crate::services::comments::{attach_replies, NestedCommentItem};
use crate::services::counter;
use serde::Deserialize;
use sqlx::PgPool;
use validator::Validate;

const BASE_PATH: &str = "/api/v1/posts";

/// Request body for creating a post, optionally with nested top-level
/// comments.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 50, message = "must be between 1 and 50 characters"))]
    pub author: String,
    #[validate(length(min = 1, max = 500, message = "must be between 1 and 500 characters"))]
    pub content: String,
    #[validate(nested)]
    pub comments: Option<Vec<NestedCommentItem>>,
}

/// Request body for updating a post, including batched comment writes with
/// per-item destroy flags.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 50, message = "must be between 1 and 50 characters"))]
    pub author: Option<String>,
    #[validate(length(min = 1, max = 500, message = "must be between 1 and 500 characters"))]
    pub content: Option<String>,
    #[validate(nested)]
    pub comments: Option<Vec<NestedCommentItem>>,
}

/// Normalized query parameters for the posts index.
#[derive(Debug, Clone)]
pub struct PostListParams {
    pub page: u32,
    pub per_page: u32,
    pub order_by: Option<String>,
    pub order_type: Option<String>,
}

pub struct PostService {
    pool: PgPool,
    count_replies: bool,
}

impl PostService {
    pub fn new(pool: PgPool, count_replies: bool) -> Self {
        Self {
            pool,
            count_replies,
        }
    }

    /// Get a post with its top-level comments and their replies
    pub async fn get(&self, post_id: i64) -> Result<PostDetail> {
        let post = post_repo::find_post(&self.pool, post_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let comments = comment_repo::top_level_for_post(&self.pool, post_id).await?;
        let comments = attach_replies(&self.pool, comments).await?;

        Ok(PostDetail { post, comments })
    }

    /// One page of posts plus pagination metadata when non-empty. Exactly
    /// one count query and one page query.
    pub async fn list(&self, params: &PostListParams) -> Result<(Vec<Post>, Option<PaginationMeta>)> {
        let ordering = Ordering::<PostSortColumn>::from_params(
            params.order_by.as_deref(),
            params.order_type.as_deref(),
        );

        let total = post_repo::count_posts(&self.pool).await?;
        let info = pagination::paginate(total as u64, params.per_page, params.page);
        let posts = post_repo::list_posts(
            &self.pool,
            ordering,
            params.per_page as i64,
            pagination::offset(params.per_page, params.page),
        )
        .await?;

        let meta = if posts.is_empty() {
            None
        } else {
            Some(PaginationMeta::new(BASE_PATH, &info, params.per_page))
        };

        Ok((posts, meta))
    }

    /// Create a post, inserting any nested comments and setting the counter
    /// in the same transaction.
    pub async fn create(&self, req: &CreatePostRequest) -> Result<Post> {
        req.validate()?;

        let mut attempt = 0;
        loop {
            match self.create_once(req).await {
                Err(err) if err.is_retryable() && attempt + 1 < counter::MAX_ATTEMPTS => {
                    attempt += 1;
                    tracing::warn!(attempt, "retrying post create after conflict");
                }
                other => return other,
            }
        }
    }

    async fn create_once(&self, req: &CreatePostRequest) -> Result<Post> {
        let mut tx = self.pool.begin().await?;

        let post = post_repo::insert_post(tx.as_mut(), &req.author, &req.content).await?;

        let mut created = 0u64;
        if let Some(items) = &req.comments {
            for item in items {
                if item.id.is_some() || item.destroy {
                    return Err(AppError::validation(
                        "comments",
                        "cannot reference an existing comment on create",
                    ));
                }
                let (author, content) = item.required_fields("comments")?;
                comment_repo::insert_comment(tx.as_mut(), post.id, None, author, content).await?;
                created += 1;
            }
        }

        counter::increment(
            tx.as_mut(),
            post.id,
            counter::created_delta(created, 0, self.count_replies),
        )
        .await?;

        tx.commit().await?;

        post_repo::find_post(&self.pool, post.id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Update a post and diff its nested comment payload (create / update /
    /// destroy with cascade) in one transaction.
    pub async fn update(&self, post_id: i64, req: &UpdatePostRequest) -> Result<PostDetail> {
        req.validate()?;

        let mut attempt = 0;
        loop {
            match self.update_once(post_id, req).await {
                Err(err) if err.is_retryable() && attempt + 1 < counter::MAX_ATTEMPTS => {
                    attempt += 1;
                    tracing::warn!(attempt, post_id, "retrying post update after conflict");
                }
                other => return other,
            }
        }
    }

    async fn update_once(&self, post_id: i64, req: &UpdatePostRequest) -> Result<PostDetail> {
        let mut tx = self.pool.begin().await?;

        // Lock the post row up front so nested writes and the counter update
        // serialize against concurrent comment mutations.
        let existing = post_repo::find_post_for_update(tx.as_mut(), post_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let author = req.author.as_deref().unwrap_or(&existing.author);
        let content = req.content.as_deref().unwrap_or(&existing.content);
        post_repo::update_post(tx.as_mut(), post_id, author, content)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut created = 0u64;
        let mut removed_delta = 0i64;
        if let Some(items) = &req.comments {
            let top_level = comment_repo::top_level_of(tx.as_mut(), post_id).await?;

            for item in items {
                match (item.id, item.destroy) {
                    (Some(comment_id), true) => {
                        if !top_level.iter().any(|c| c.id == comment_id) {
                            return Err(AppError::validation(
                                "comments",
                                "references an unknown comment",
                            ));
                        }
                        let subtree =
                            comment_repo::collect_subtree(tx.as_mut(), comment_id).await?;
                        let rows = comment_repo::delete_by_ids(tx.as_mut(), &subtree).await?;
                        removed_delta += counter::removed_delta(true, rows, self.count_replies);
                    }
                    (Some(comment_id), false) => {
                        let comment = top_level
                            .iter()
                            .find(|c| c.id == comment_id)
                            .ok_or_else(|| {
                                AppError::validation("comments", "references an unknown comment")
                            })?;
                        let author = item.author.as_deref().unwrap_or(&comment.author);
                        let content = item.content.as_deref().unwrap_or(&comment.content);
                        comment_repo::update_comment(tx.as_mut(), comment_id, author, content)
                            .await?
                            .ok_or(AppError::NotFound)?;
                    }
                    (None, true) => {
                        // destroy without an id is a no-op item
                    }
                    (None, false) => {
                        let (author, content) = item.required_fields("comments")?;
                        comment_repo::insert_comment(tx.as_mut(), post_id, None, author, content)
                            .await?;
                        created += 1;
                    }
                }
            }
        }

        let delta = counter::created_delta(created, 0, self.count_replies) - removed_delta;
        counter::adjust(tx.as_mut(), post_id, delta).await?;

        tx.commit().await?;

        self.get(post_id).await
    }

    /// Destroy a post. The store cascades to every comment on it, so the
    /// post and its whole comment tree disappear atomically.
    pub async fn destroy(&self, post_id: i64) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.destroy_once(post_id).await {
                Err(err) if err.is_retryable() && attempt + 1 < counter::MAX_ATTEMPTS => {
                    attempt += 1;
                    tracing::warn!(attempt, post_id, "retrying post destroy after conflict");
                }
                other => return other,
            }
        }
    }

    async fn destroy_once(&self, post_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let rows = post_repo::delete_post(tx.as_mut(), post_id).await?;
        if rows == 0 {
            return Err(AppError::NotFound);
        }

        tx.commit().await?;

        tracing::debug!(post_id, "post removed with its comment tree");
        Ok(())
    }
}
