/// Comment service - threading, cascade deletes, and counter upkeep
///
/// Every mutating operation runs as one transaction: parent validation,
/// the write itself, any cascade, and the counter adjustment commit or roll
/// back together. Serialization failures re-run the whole transaction, not
/// just the counter step.
use crate::db::{comment_repo, post_repo};
use crate::error::{AppError, Result};
use crate::models::{Comment, CommentWithReplies, Post};
use crate::ordering::{CommentSortColumn, Ordering};
use crate::pagination::{self, PaginationMeta};
use crate::services::counter;
use serde::Deserialize;
use sqlx::PgPool;
use std::collections::HashMap;
use validator::Validate;

const BASE_PATH: &str = "/api/v1/comments";

/// Request body for creating a comment. A reply inherits its parent's
/// post_id regardless of what the client supplies.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCommentRequest {
    pub post_id: Option<i64>,
    pub parent_comment_id: Option<i64>,
    #[validate(length(min = 1, max = 50, message = "must be between 1 and 50 characters"))]
    pub author: String,
    #[validate(length(min = 1, max = 500, message = "must be between 1 and 500 characters"))]
    pub content: String,
    #[validate(nested)]
    pub replies: Option<Vec<NestedCommentItem>>,
}

/// Request body for updating a comment, including batched reply writes.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, max = 50, message = "must be between 1 and 50 characters"))]
    pub author: Option<String>,
    #[validate(length(min = 1, max = 500, message = "must be between 1 and 500 characters"))]
    pub content: Option<String>,
    #[validate(nested)]
    pub replies: Option<Vec<NestedCommentItem>>,
}

/// One item of a nested child payload: create (no id), update (id), or
/// delete (id plus `_destroy`).
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NestedCommentItem {
    pub id: Option<i64>,
    #[validate(length(min = 1, max = 50, message = "must be between 1 and 50 characters"))]
    pub author: Option<String>,
    #[validate(length(min = 1, max = 500, message = "must be between 1 and 500 characters"))]
    pub content: Option<String>,
    #[serde(default, rename = "_destroy")]
    pub destroy: bool,
}

impl NestedCommentItem {
    /// Author and content are required when the item creates a new row.
    pub fn required_fields(&self, field_prefix: &str) -> Result<(&str, &str)> {
        let author = self
            .author
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppError::validation(&format!("{field_prefix}.author"), "can't be blank")
            })?;
        let content = self
            .content
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppError::validation(&format!("{field_prefix}.content"), "can't be blank")
            })?;

        Ok((author, content))
    }
}

/// Normalized query parameters for the comments index.
#[derive(Debug, Clone)]
pub struct CommentListParams {
    pub post_id: Option<i64>,
    pub page: u32,
    pub per_page: u32,
    pub order_by: Option<String>,
    pub order_type: Option<String>,
}

pub struct CommentService {
    pool: PgPool,
    count_replies: bool,
}

impl CommentService {
    pub fn new(pool: PgPool, count_replies: bool) -> Self {
        Self {
            pool,
            count_replies,
        }
    }

    /// Get a comment with its replies, plus the owning post
    pub async fn get(&self, comment_id: i64) -> Result<(CommentWithReplies, Post)> {
        let comment = comment_repo::find_comment(&self.pool, comment_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let post = post_repo::find_post(&self.pool, comment.post_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let replies = comment_repo::replies_for(&self.pool, &[comment.id]).await?;

        Ok((CommentWithReplies { comment, replies }, post))
    }

    /// One page of top-level comments with their replies, plus pagination
    /// metadata when the page is non-empty. Exactly one count query and one
    /// page query; replies are eager-loaded in a single batch.
    pub async fn list(
        &self,
        params: &CommentListParams,
    ) -> Result<(Vec<CommentWithReplies>, Option<PaginationMeta>)> {
        let ordering = Ordering::<CommentSortColumn>::from_params(
            params.order_by.as_deref(),
            params.order_type.as_deref(),
        );

        let total = comment_repo::count_top_level(&self.pool, params.post_id).await?;
        let info = pagination::paginate(total as u64, params.per_page, params.page);
        let comments = comment_repo::list_top_level(
            &self.pool,
            params.post_id,
            ordering,
            params.per_page as i64,
            pagination::offset(params.per_page, params.page),
        )
        .await?;

        let comments = self.attach_replies(comments).await?;
        let meta = if comments.is_empty() {
            None
        } else {
            Some(PaginationMeta::new(BASE_PATH, &info, params.per_page))
        };

        Ok((comments, meta))
    }

    /// Create a comment (optionally with nested replies) and adjust the
    /// owning post's counter, all in one transaction.
    pub async fn create(&self, req: &CreateCommentRequest) -> Result<(CommentWithReplies, Post)> {
        req.validate()?;

        let mut attempt = 0;
        loop {
            match self.create_once(req).await {
                Err(err) if err.is_retryable() && attempt + 1 < counter::MAX_ATTEMPTS => {
                    attempt += 1;
                    tracing::warn!(attempt, "retrying comment create after conflict");
                }
                other => return other,
            }
        }
    }

    async fn create_once(&self, req: &CreateCommentRequest) -> Result<(CommentWithReplies, Post)> {
        let mut tx = self.pool.begin().await?;

        // Locking the parent row keeps a concurrent cascade delete from
        // removing it between validation and commit; the FK is the backstop.
        let parent = match req.parent_comment_id {
            Some(parent_id) => Some(
                comment_repo::find_comment_for_update(tx.as_mut(), parent_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::validation(
                            "parent_comment_id",
                            "must reference an existing comment",
                        )
                    })?,
            ),
            None => None,
        };

        // A reply always lives on its parent's post, whatever the client sent.
        let post_id = match &parent {
            Some(parent) => parent.post_id,
            None => req
                .post_id
                .ok_or_else(|| AppError::validation("post", "must exist"))?,
        };

        if parent.is_none() && !post_repo::post_exists(tx.as_mut(), post_id).await? {
            return Err(AppError::validation("post", "must exist"));
        }

        let comment = comment_repo::insert_comment(
            tx.as_mut(),
            post_id,
            req.parent_comment_id,
            &req.author,
            &req.content,
        )
        .await?;

        let mut replies = Vec::new();
        if let Some(items) = &req.replies {
            for item in items {
                if item.id.is_some() || item.destroy {
                    return Err(AppError::validation(
                        "replies",
                        "cannot reference an existing comment on create",
                    ));
                }
                let (author, content) = item.required_fields("replies")?;
                replies.push(
                    comment_repo::insert_comment(
                        tx.as_mut(),
                        post_id,
                        Some(comment.id),
                        author,
                        content,
                    )
                    .await?,
                );
            }
        }

        let top_level_created = u64::from(comment.is_top_level());
        let delta =
            counter::created_delta(top_level_created, replies.len() as u64, self.count_replies);
        counter::increment(tx.as_mut(), post_id, delta).await?;

        tx.commit().await?;

        let post = post_repo::find_post(&self.pool, post_id)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok((CommentWithReplies { comment, replies }, post))
    }

    /// Update a comment and diff its nested reply payload (create / update /
    /// destroy with cascade) in one transaction.
    pub async fn update(
        &self,
        comment_id: i64,
        req: &UpdateCommentRequest,
    ) -> Result<(CommentWithReplies, Post)> {
        req.validate()?;

        let mut attempt = 0;
        loop {
            match self.update_once(comment_id, req).await {
                Err(err) if err.is_retryable() && attempt + 1 < counter::MAX_ATTEMPTS => {
                    attempt += 1;
                    tracing::warn!(attempt, comment_id, "retrying comment update after conflict");
                }
                other => return other,
            }
        }
    }

    async fn update_once(
        &self,
        comment_id: i64,
        req: &UpdateCommentRequest,
    ) -> Result<(CommentWithReplies, Post)> {
        let mut tx = self.pool.begin().await?;

        let existing = comment_repo::find_comment_for_update(tx.as_mut(), comment_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let author = req.author.as_deref().unwrap_or(&existing.author);
        let content = req.content.as_deref().unwrap_or(&existing.content);
        comment_repo::update_comment(tx.as_mut(), comment_id, author, content)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut created = 0u64;
        let mut removed = 0u64;
        if let Some(items) = &req.replies {
            let direct: Vec<Comment> = comment_repo::replies_of(tx.as_mut(), comment_id).await?;
            let direct_ids: Vec<i64> = direct.iter().map(|r| r.id).collect();

            for item in items {
                match (item.id, item.destroy) {
                    (Some(reply_id), true) => {
                        if !direct_ids.contains(&reply_id) {
                            return Err(AppError::validation(
                                "replies",
                                "references an unknown reply",
                            ));
                        }
                        let subtree = comment_repo::collect_subtree(tx.as_mut(), reply_id).await?;
                        removed += comment_repo::delete_by_ids(tx.as_mut(), &subtree).await?;
                    }
                    (Some(reply_id), false) => {
                        let reply = direct
                            .iter()
                            .find(|r| r.id == reply_id)
                            .ok_or_else(|| {
                                AppError::validation("replies", "references an unknown reply")
                            })?;
                        let author = item.author.as_deref().unwrap_or(&reply.author);
                        let content = item.content.as_deref().unwrap_or(&reply.content);
                        comment_repo::update_comment(tx.as_mut(), reply_id, author, content)
                            .await?
                            .ok_or(AppError::NotFound)?;
                    }
                    (None, true) => {
                        // destroy without an id is a no-op item
                    }
                    (None, false) => {
                        let (author, content) = item.required_fields("replies")?;
                        comment_repo::insert_comment(
                            tx.as_mut(),
                            existing.post_id,
                            Some(comment_id),
                            author,
                            content,
                        )
                        .await?;
                        created += 1;
                    }
                }
            }
        }

        // Replies never change the top-level count; under the count-replies
        // policy the net change is creates minus cascade removals.
        let delta = counter::created_delta(0, created, self.count_replies)
            - counter::removed_delta(false, removed, self.count_replies);
        counter::adjust(tx.as_mut(), existing.post_id, delta).await?;

        tx.commit().await?;

        self.get(comment_id).await
    }

    /// Destroy a comment and its entire reply subtree, decrementing the
    /// counter by the number of counting comments actually removed.
    pub async fn destroy(&self, comment_id: i64) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.destroy_once(comment_id).await {
                Err(err) if err.is_retryable() && attempt + 1 < counter::MAX_ATTEMPTS => {
                    attempt += 1;
                    tracing::warn!(attempt, comment_id, "retrying comment destroy after conflict");
                }
                other => return other,
            }
        }
    }

    async fn destroy_once(&self, comment_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let existing = comment_repo::find_comment_for_update(tx.as_mut(), comment_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let subtree = comment_repo::collect_subtree(tx.as_mut(), comment_id).await?;
        let rows_removed = comment_repo::delete_by_ids(tx.as_mut(), &subtree).await?;

        let delta =
            counter::removed_delta(existing.is_top_level(), rows_removed, self.count_replies);
        counter::decrement(tx.as_mut(), existing.post_id, delta).await?;

        tx.commit().await?;

        tracing::debug!(
            comment_id,
            rows_removed,
            "comment subtree removed"
        );
        Ok(())
    }

    async fn attach_replies(&self, comments: Vec<Comment>) -> Result<Vec<CommentWithReplies>> {
        attach_replies(&self.pool, comments).await
    }
}

/// Pair each top-level comment with its direct replies using one batched
/// query, avoiding a per-comment lookup.
pub(crate) async fn attach_replies(
    pool: &PgPool,
    comments: Vec<Comment>,
) -> Result<Vec<CommentWithReplies>> {
    let ids: Vec<i64> = comments.iter().map(|c| c.id).collect();
    let mut by_parent: HashMap<i64, Vec<Comment>> = HashMap::new();
    for reply in comment_repo::replies_for(pool, &ids).await? {
        if let Some(parent_id) = reply.parent_comment_id {
            by_parent.entry(parent_id).or_default().push(reply);
        }
    }

    Ok(comments
        .into_iter()
        .map(|comment| CommentWithReplies {
            replies: by_parent.remove(&comment.id).unwrap_or_default(),
            comment,
        })
        .collect())
}
