/// Data models for the discussion service
///
/// - `Post`: a top-level piece of content carrying a denormalized
///   `comments_count`
/// - `Comment`: a comment on a post, optionally a reply to another comment
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub author: String,
    pub content: String,
    /// Denormalized count of top-level comments (or all comments when the
    /// counting policy includes replies). Never settable by clients.
    pub comments_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    /// None for a top-level comment, the parent's id for a reply.
    pub parent_comment_id: Option<i64>,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_top_level(&self) -> bool {
        self.parent_comment_id.is_none()
    }
}

/// A top-level comment eagerly paired with its full reply list.
#[derive(Debug, Clone, Serialize)]
pub struct CommentWithReplies {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

/// A post with its top-level comments and their replies, as returned by show.
#[derive(Debug, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<CommentWithReplies>,
}
