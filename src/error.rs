/// Error types for the discussion service
///
/// Errors are converted to appropriate HTTP responses for API clients.
/// Validation failures carry a field -> messages map so clients can render
/// per-field errors the way the API contract promises.
use actix_web::{error::ResponseError, http::header, http::StatusCode, HttpResponse};
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type for discussion-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Structured validation errors keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages_for(&self, field: &str) -> Option<&Vec<String>> {
        self.0.get(field)
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut out = Self::new();
        collect_validation_errors(&mut out, "", &errors);
        out
    }
}

/// Flatten validator's nested error tree into dotted field paths, e.g.
/// `replies[0].content`.
fn collect_validation_errors(out: &mut FieldErrors, prefix: &str, errors: &validator::ValidationErrors) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "is invalid".to_string());
                    out.add(&path, &message);
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                collect_validation_errors(out, &path, nested);
            }
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_validation_errors(out, &format!("{path}[{index}]"), nested);
                }
            }
        }
    }
}

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Referenced id does not exist
    #[error("Not Found")]
    NotFound,

    /// One or more fields failed validation
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Missing or invalid credentials on a mutating request
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Counter transaction could not be serialized after retries
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        AppError::Validation(FieldErrors::single(field, message))
    }

    /// Serialization failures and deadlocks are retried with the whole
    /// transaction re-run from scratch before they surface to the client.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrencyConflict(_))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::ConcurrencyConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        match self {
            AppError::Validation(errors) => HttpResponse::build(status).json(errors),
            AppError::NotFound => HttpResponse::build(status).json(serde_json::json!({
                "error": "Not Found",
            })),
            AppError::Unauthorized(_) => HttpResponse::build(status)
                .insert_header((header::WWW_AUTHENTICATE, "Basic realm=\"api\""))
                .json(serde_json::json!({
                    "error": self.to_string(),
                    "status": status.as_u16(),
                })),
            _ => HttpResponse::build(status).json(serde_json::json!({
                "error": self.to_string(),
                "status": status.as_u16(),
            })),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    // Postgres serialization_failure / deadlock_detected
                    if code == "40001" || code == "40P01" {
                        return AppError::ConcurrencyConflict(db_err.to_string());
                    }
                    // A parent deleted between validation and commit trips the
                    // foreign key; surface it as the same validation error.
                    if code == "23503" {
                        if let Some(constraint) = db_err.constraint() {
                            if constraint.contains("parent_comment") {
                                return AppError::validation(
                                    "parent_comment_id",
                                    "must reference an existing comment",
                                );
                            }
                            if constraint.contains("post") {
                                return AppError::validation("post", "must exist");
                            }
                        }
                    }
                }
                AppError::Database(db_err.to_string())
            }
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_taxonomy() {
        assert_eq!(
            AppError::NotFound.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::validation("author", "can't be blank").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Unauthorized("missing credentials".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::ConcurrencyConflict("serialization failure".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Database("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn only_concurrency_conflicts_are_retryable() {
        assert!(AppError::ConcurrencyConflict("x".into()).is_retryable());
        assert!(!AppError::NotFound.is_retryable());
        assert!(!AppError::Database("x".into()).is_retryable());
        assert!(!AppError::validation("f", "m").is_retryable());
    }

    #[test]
    fn field_errors_accumulate_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("author", "can't be blank");
        errors.add("author", "is too long (maximum is 50 characters)");
        errors.add("content", "can't be blank");

        assert_eq!(errors.messages_for("author").unwrap().len(), 2);
        assert_eq!(errors.messages_for("content").unwrap().len(), 1);
        assert!(errors.messages_for("post").is_none());
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::NotFound));
    }

    #[test]
    fn validation_serializes_as_field_map() {
        let errors = FieldErrors::single("parent_comment_id", "must reference an existing comment");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "parent_comment_id": ["must reference an existing comment"]
            })
        );
    }
}
