//! HTTP API handlers
//!
//! Every error leaves as `{"error": {"code", "message"}}`, including
//! malformed ids and request bodies that axum would otherwise reject with
//! plain text.

pub mod findings;
pub mod health;
pub mod scorecard;
pub mod submissions;
pub mod suppliers;

pub use findings::finding_routes;
pub use health::health_routes;
pub use scorecard::scorecard_routes;
pub use submissions::submission_routes;
pub use suppliers::supplier_routes;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Parse a UUID path segment
pub(crate) fn parse_id(text: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(text).map_err(|_| ApiError::BadRequest(format!("Invalid {} id '{}'", what, text)))
}

/// Unwrap a JSON body, turning extractor rejections into API errors
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}
