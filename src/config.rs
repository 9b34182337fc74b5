/// Configuration management for the discussion service
///
/// This module handles loading and managing configuration from environment
/// variables.
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// HTTP Basic credentials for mutating endpoints
    pub auth: AuthConfig,
    /// List endpoint pagination defaults
    pub pagination: PaginationConfig,
    /// Comment counting policy
    pub comments: CommentsConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
}

/// Credentials checked by the Basic auth middleware. Read endpoints are open;
/// create/update/destroy require these to be set and to match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Pagination defaults for list endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Page size when the client does not send per_page
    pub default_per_page: u32,
    /// Upper bound on client-supplied per_page
    pub max_per_page: u32,
}

/// Comment counting policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentsConfig {
    /// When true, comments_count includes replies instead of only
    /// top-level comments.
    pub count_replies: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let is_production = app_env.eq_ignore_ascii_case("production");

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("DISCUSSION_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("DISCUSSION_SERVICE_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
            },
            cors: {
                let allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
                    Ok(value) => value,
                    Err(_) if is_production => {
                        return Err("CORS_ALLOWED_ORIGINS must be set in production".to_string())
                    }
                    Err(_) => "http://localhost:3000".to_string(),
                };

                if is_production && allowed_origins.trim() == "*" {
                    return Err("CORS_ALLOWED_ORIGINS cannot be '*' in production".to_string());
                }

                CorsConfig { allowed_origins }
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/discussion".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(10),
            },
            auth: {
                let username = std::env::var("API_USERNAME").ok();
                let password = std::env::var("API_PASSWORD").ok();

                if is_production && (username.is_none() || password.is_none()) {
                    return Err(
                        "API_USERNAME and API_PASSWORD must be set in production".to_string()
                    );
                }

                AuthConfig { username, password }
            },
            pagination: PaginationConfig {
                default_per_page: std::env::var("PAGINATION_DEFAULT_PER_PAGE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(20),
                max_per_page: std::env::var("PAGINATION_MAX_PER_PAGE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(100),
            },
            comments: CommentsConfig {
                count_replies: std::env::var("COMMENTS_COUNT_INCLUDE_REPLIES")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(false),
            },
        })
    }
}
