//! Error types for scorecard-ingest
//!
//! `PipelineError` is the domain fault taxonomy; `ApiError` maps it onto
//! HTTP status codes and the `{"error": {"code", "message"}}` body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::SubmissionStatus;
use crate::services::duplicate_detector::DuplicateError;

/// Pipeline / store faults
///
/// Validation problems are never errors here; they are findings.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Duplicate(Box<DuplicateError>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Finding {0} is already resolved")]
    AlreadyResolved(Uuid),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Document of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// I/O or transaction failure; nothing was committed
    #[error("Store failure: {0}")]
    Store(#[from] scorecard_common::Error),
}

impl PipelineError {
    /// Transient SQLite lock contention (safe to re-run the transaction)
    pub fn is_database_locked(&self) -> bool {
        matches!(self, PipelineError::Store(inner) if inner.is_database_locked())
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::Store(scorecard_common::Error::Database(err))
    }
}

impl From<DuplicateError> for PipelineError {
    fn from(err: DuplicateError) -> Self {
        PipelineError::Duplicate(Box::new(err))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Duplicate submission (409 with the original submission attached)
    #[error("{0}")]
    Duplicate(Box<DuplicateError>),

    /// Upload too large (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// scorecard-common error
    #[error("Common error: {0}")]
    Common(scorecard_common::Error),
}

impl From<scorecard_common::Error> for ApiError {
    fn from(err: scorecard_common::Error) -> Self {
        match err {
            scorecard_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            scorecard_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Common(other),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Duplicate(dup) => ApiError::Duplicate(dup),
            PipelineError::NotFound(msg) => ApiError::NotFound(msg),
            e @ PipelineError::AlreadyResolved(_) => ApiError::Conflict(e.to_string()),
            e @ PipelineError::InvalidTransition { .. } => ApiError::BadRequest(e.to_string()),
            PipelineError::InvalidInput(msg) => ApiError::BadRequest(msg),
            e @ PipelineError::PayloadTooLarge { .. } => ApiError::PayloadTooLarge(e.to_string()),
            PipelineError::Store(inner) => ApiError::from(inner),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            ApiError::Duplicate(dup) => (StatusCode::CONFLICT, "DUPLICATE_SUBMISSION", dup.to_string()),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg.clone())
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
            ApiError::Common(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", err.to_string())
            }
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", message);
        }

        let body = match &self {
            ApiError::Duplicate(dup) => json!({
                "error": {
                    "code": error_code,
                    "message": message,
                    "duplicate": dup.as_ref(),
                }
            }),
            _ => json!({
                "error": {
                    "code": error_code,
                    "message": message,
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
