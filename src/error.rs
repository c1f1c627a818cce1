//! Domain error types for the test platform.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Request payload failed field validation
    #[error("Validation failed: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Validation(Vec<FieldError>),

    /// Malformed input that is not tied to a single field
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Close attempted while linked cases are unresolved
    #[error("Job {job_id} still has {unresolved} unresolved case(s)")]
    IncompleteJob { job_id: uuid::Uuid, unresolved: u64 },

    /// Dispatch target jobs resolved to an empty set
    #[error("None of the jobs to dispatch exist")]
    NoSuchJobs,

    /// Dispatch target users resolved to an empty set
    #[error("None of the assignees exist")]
    NoSuchUsers,

    /// Job-to-case link does not exist
    #[error("Case is not linked to a job (link {0})")]
    NoSuchLink(uuid::Uuid),

    /// Unique constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Requesting user could not be identified
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Storage (S3) operation failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// Shorthand for a validation error on a single field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::IncompleteJob { .. } => "INCOMPLETE_JOB",
            AppError::NoSuchJobs => "NO_SUCH_JOBS",
            AppError::NoSuchUsers => "NO_SUCH_USERS",
            AppError::NoSuchLink(_) => "NO_SUCH_LINK",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            // Lookup and lifecycle failures are client errors on this API.
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (message, details) = match self {
            AppError::Database(err_str) => {
                tracing::error!("Database error: {}", err_str);
                ("An internal database error occurred".to_string(), None)
            }
            AppError::Storage(err_str) => {
                tracing::error!("Storage error: {}", err_str);
                ("An internal storage error occurred".to_string(), None)
            }
            AppError::Validation(fields) => (self.to_string(), Some(fields.clone())),
            _ => (self.to_string(), None),
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.error_code().to_string(),
            message,
            details,
        })
    }
}

/// Error response body matching OpenAPI schema.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Field-level detail for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        if let Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return AppError::Conflict(detail);
        }
        AppError::Database(err.to_string())
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("Invalid UUID: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_errors_are_bad_requests() {
        let job_id = uuid::Uuid::now_v7();
        for err in [
            AppError::NotFound("Job".to_string()),
            AppError::IncompleteJob {
                job_id,
                unresolved: 2,
            },
            AppError::NoSuchJobs,
            AppError::NoSuchUsers,
            AppError::NoSuchLink(job_id),
            AppError::field("level", "is required"),
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{}", err);
        }
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let err = AppError::Database("connection refused".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_validation_message_lists_fields() {
        let err = AppError::Validation(vec![
            FieldError::new("level", "is required"),
            FieldError::new("task_name", "must not be empty"),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: level: is required; task_name: must not be empty"
        );
    }
}
