/// Discussion Service Library
///
/// A small content API managing posts and threaded comments, with a
/// denormalized per-post comment counter kept exactly consistent under
/// concurrent mutation.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers
/// - `models`: Data structures for posts and comments
/// - `services`: Business logic layer (threading, cascades, counter)
/// - `db`: Database access layer and repositories
/// - `ordering`: Allow-listed sort parameter validation
/// - `pagination`: Page metadata and navigation links
/// - `middleware`: HTTP Basic credential verification
/// - `error`: Error types and handling
/// - `config`: Configuration management
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod ordering;
pub mod pagination;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

use crate::config::AuthConfig;
use actix_web::web;

/// Register the `/api/v1` resources. Reads are open; mutating routes sit
/// behind the Basic auth middleware.
pub fn register_routes(cfg: &mut web::ServiceConfig, auth: AuthConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::scope("/posts")
                    .route("", web::get().to(handlers::posts::index))
                    .route("/{id}", web::get().to(handlers::posts::show))
                    .service(
                        web::scope("")
                            .wrap(middleware::BasicAuthMiddleware::new(auth.clone()))
                            .route("", web::post().to(handlers::posts::create))
                            .route("/{id}", web::put().to(handlers::posts::update))
                            .route("/{id}", web::patch().to(handlers::posts::update))
                            .route("/{id}", web::delete().to(handlers::posts::destroy)),
                    ),
            )
            .service(
                web::scope("/comments")
                    .route("", web::get().to(handlers::comments::index))
                    .route("/{id}", web::get().to(handlers::comments::show))
                    .service(
                        web::scope("")
                            .wrap(middleware::BasicAuthMiddleware::new(auth))
                            .route("", web::post().to(handlers::comments::create))
                            .route("/{id}", web::put().to(handlers::comments::update))
                            .route("/{id}", web::patch().to(handlers::comments::update))
                            .route("/{id}", web::delete().to(handlers::comments::destroy)),
                    ),
            ),
    );
}
