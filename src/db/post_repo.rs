use crate::models::Post;
use crate::ordering::{Ordering, PostSortColumn};
use sqlx::{PgConnection, PgPool, Row};

const POST_COLUMNS: &str = "id, author, content, comments_count, created_at, updated_at";

/// Insert a new post
pub async fn insert_post(
    conn: &mut PgConnection,
    author: &str,
    content: &str,
) -> Result<Post, sqlx::Error> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (author, content)
        VALUES ($1, $2)
        RETURNING id, author, content, comments_count, created_at, updated_at
        "#,
    )
    .bind(author)
    .bind(content)
    .fetch_one(conn)
    .await?;

    Ok(post)
}

/// Find a post by ID
pub async fn find_post(pool: &PgPool, post_id: i64) -> Result<Option<Post>, sqlx::Error> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, author, content, comments_count, created_at, updated_at
        FROM posts
        WHERE id = $1
        "#,
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await?;

    Ok(post)
}

/// Find a post by ID inside a transaction, taking an exclusive row lock
pub async fn find_post_for_update(
    conn: &mut PgConnection,
    post_id: i64,
) -> Result<Option<Post>, sqlx::Error> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, author, content, comments_count, created_at, updated_at
        FROM posts
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(post_id)
    .fetch_optional(conn)
    .await?;

    Ok(post)
}

/// Check that a post exists, inside a transaction
pub async fn post_exists(conn: &mut PgConnection, post_id: i64) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM posts WHERE id = $1")
        .bind(post_id)
        .fetch_optional(conn)
        .await?;

    Ok(row.is_some())
}

/// Update a post's author and content
pub async fn update_post(
    conn: &mut PgConnection,
    post_id: i64,
    author: &str,
    content: &str,
) -> Result<Option<Post>, sqlx::Error> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        UPDATE posts
        SET author = $1, content = $2, updated_at = NOW()
        WHERE id = $3
        RETURNING id, author, content, comments_count, created_at, updated_at
        "#,
    )
    .bind(author)
    .bind(content)
    .bind(post_id)
    .fetch_optional(conn)
    .await?;

    Ok(post)
}

/// Delete a post. The foreign key cascades to every comment on it, so the
/// whole removal is one statement and one transaction.
pub async fn delete_post(conn: &mut PgConnection, post_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(post_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}

/// Fetch one page of posts in the validated order.
pub async fn list_posts(
    pool: &PgPool,
    ordering: Ordering<PostSortColumn>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Post>, sqlx::Error> {
    // order_clause is built from allow-listed static strings only
    let query = format!(
        "SELECT {POST_COLUMNS} FROM posts ORDER BY {} LIMIT $1 OFFSET $2",
        ordering.order_clause()
    );

    let posts = sqlx::query_as::<_, Post>(&query)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok(posts)
}

/// Count all posts
pub async fn count_posts(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS count FROM posts")
        .fetch_one(pool)
        .await?;

    Ok(row.get::<i64, _>("count"))
}
