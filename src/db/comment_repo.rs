use crate::models::Comment;
use crate::ordering::{CommentSortColumn, Ordering};
use sqlx::{PgConnection, PgPool, Row};

const COMMENT_COLUMNS: &str =
    "id, post_id, parent_comment_id, author, content, created_at, updated_at";

/// Insert a new comment
pub async fn insert_comment(
    conn: &mut PgConnection,
    post_id: i64,
    parent_comment_id: Option<i64>,
    author: &str,
    content: &str,
) -> Result<Comment, sqlx::Error> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (post_id, parent_comment_id, author, content)
        VALUES ($1, $2, $3, $4)
        RETURNING id, post_id, parent_comment_id, author, content, created_at, updated_at
        "#,
    )
    .bind(post_id)
    .bind(parent_comment_id)
    .bind(author)
    .bind(content)
    .fetch_one(conn)
    .await?;

    Ok(comment)
}

/// Find a comment by ID
pub async fn find_comment(pool: &PgPool, comment_id: i64) -> Result<Option<Comment>, sqlx::Error> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, parent_comment_id, author, content, created_at, updated_at
        FROM comments
        WHERE id = $1
        "#,
    )
    .bind(comment_id)
    .fetch_optional(pool)
    .await?;

    Ok(comment)
}

/// Find a comment by ID inside a transaction
pub async fn find_comment_for_update(
    conn: &mut PgConnection,
    comment_id: i64,
) -> Result<Option<Comment>, sqlx::Error> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, parent_comment_id, author, content, created_at, updated_at
        FROM comments
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(comment_id)
    .fetch_optional(conn)
    .await?;

    Ok(comment)
}

/// Update a comment's author and content
pub async fn update_comment(
    conn: &mut PgConnection,
    comment_id: i64,
    author: &str,
    content: &str,
) -> Result<Option<Comment>, sqlx::Error> {
    let comment = sqlx::query_as::<_, Comment>(
        r#"
        UPDATE comments
        SET author = $1, content = $2, updated_at = NOW()
        WHERE id = $3
        RETURNING id, post_id, parent_comment_id, author, content, created_at, updated_at
        "#,
    )
    .bind(author)
    .bind(content)
    .bind(comment_id)
    .fetch_optional(conn)
    .await?;

    Ok(comment)
}

/// Fetch one page of top-level comments, optionally scoped to a post, in the
/// validated order.
pub async fn list_top_level(
    pool: &PgPool,
    post_id: Option<i64>,
    ordering: Ordering<CommentSortColumn>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Comment>, sqlx::Error> {
    // order_clause is built from allow-listed static strings only
    let query = format!(
        "SELECT {COMMENT_COLUMNS} FROM comments \
         WHERE parent_comment_id IS NULL AND ($1::bigint IS NULL OR post_id = $1) \
         ORDER BY {} LIMIT $2 OFFSET $3",
        ordering.order_clause()
    );

    let comments = sqlx::query_as::<_, Comment>(&query)
        .bind(post_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok(comments)
}

/// Count top-level comments, optionally scoped to a post
pub async fn count_top_level(pool: &PgPool, post_id: Option<i64>) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS count FROM comments
        WHERE parent_comment_id IS NULL AND ($1::bigint IS NULL OR post_id = $1)
        "#,
    )
    .bind(post_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get::<i64, _>("count"))
}

/// All top-level comments of a post, oldest first, for the post detail view.
pub async fn top_level_for_post(pool: &PgPool, post_id: i64) -> Result<Vec<Comment>, sqlx::Error> {
    let comments = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, parent_comment_id, author, content, created_at, updated_at
        FROM comments
        WHERE post_id = $1 AND parent_comment_id IS NULL
        ORDER BY id ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;

    Ok(comments)
}

/// Top-level comments of a post, inside a transaction
pub async fn top_level_of(
    conn: &mut PgConnection,
    post_id: i64,
) -> Result<Vec<Comment>, sqlx::Error> {
    let comments = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, parent_comment_id, author, content, created_at, updated_at
        FROM comments
        WHERE post_id = $1 AND parent_comment_id IS NULL
        ORDER BY id ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(conn)
    .await?;

    Ok(comments)
}

/// Fetch all replies whose parent is in `parent_ids`, in one query.
pub async fn replies_for(pool: &PgPool, parent_ids: &[i64]) -> Result<Vec<Comment>, sqlx::Error> {
    if parent_ids.is_empty() {
        return Ok(Vec::new());
    }

    let replies = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, parent_comment_id, author, content, created_at, updated_at
        FROM comments
        WHERE parent_comment_id = ANY($1)
        ORDER BY id ASC
        "#,
    )
    .bind(parent_ids)
    .fetch_all(pool)
    .await?;

    Ok(replies)
}

/// Direct replies to a comment, inside a transaction
pub async fn replies_of(
    conn: &mut PgConnection,
    parent_comment_id: i64,
) -> Result<Vec<Comment>, sqlx::Error> {
    let replies = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, post_id, parent_comment_id, author, content, created_at, updated_at
        FROM comments
        WHERE parent_comment_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(parent_comment_id)
    .fetch_all(conn)
    .await?;

    Ok(replies)
}

/// One worklist step of a cascade: ids of comments whose parent is in
/// `parent_ids`, locked against concurrent mutation.
pub async fn child_ids_of(
    conn: &mut PgConnection,
    parent_ids: &[i64],
) -> Result<Vec<i64>, sqlx::Error> {
    if parent_ids.is_empty() {
        return Ok(Vec::new());
    }

    // FOR UPDATE makes the walk serialize against in-flight reply creates:
    // a create holding the parent row blocks this step until it commits, and
    // the re-read then includes its reply in the frontier.
    let ids: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM comments WHERE parent_comment_id = ANY($1) FOR UPDATE")
            .bind(parent_ids)
            .fetch_all(conn)
            .await?;

    Ok(ids)
}

/// Delete a set of comments by id, returning the number of rows removed.
pub async fn delete_by_ids(conn: &mut PgConnection, ids: &[i64]) -> Result<u64, sqlx::Error> {
    if ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query("DELETE FROM comments WHERE id = ANY($1)")
        .bind(ids)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

/// Collect a comment's entire reply subtree (root included) with an explicit
/// worklist, one locking query per tree level. Depth is bounded in practice,
/// and the worklist avoids unbounded recursion. Because every level is locked
/// as it is collected, a reply created concurrently either lands in the
/// collected set or its create fails parent validation after the cascade
/// commits; the returned ids are exactly the rows the delete will remove.
pub async fn collect_subtree(
    conn: &mut PgConnection,
    root_id: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    let mut all = vec![root_id];
    let mut frontier = vec![root_id];

    while !frontier.is_empty() {
        frontier = child_ids_of(conn, &frontier).await?;
        all.extend_from_slice(&frontier);
    }

    Ok(all)
}
