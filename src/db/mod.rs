/// Database access layer
///
/// Connection pooling, migrations, and repository functions for posts and
/// comments. Read paths take `&PgPool`; write paths take `&mut PgConnection`
/// so they compose inside a caller-owned transaction.
pub mod comment_repo;
pub mod post_repo;

use crate::config::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Create a PostgreSQL connection pool and verify it answers.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    info!(
        max_connections = config.max_connections,
        "Database pool created and verified"
    );

    Ok(pool)
}

/// Run pending schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}
