//! Submission endpoints
//!
//! - POST /api/suppliers/:supplier_id/submissions (raw document body)
//! - GET  /api/submissions
//! - GET  /api/submissions/:id
//! - GET  /api/submissions/:id/document
//! - POST /api/submissions/:id/reprocessed

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{json_body, parse_id};
use crate::db::submissions::SubmissionFilter;
use crate::error::{ApiError, ApiResult};
use crate::models::{ContentType, FindingSummary, Submission, SubmissionStatus, SubmissionSummary};
use crate::pagination::Page;
use crate::services::{SubmitReceipt, SubmitRequest};
use crate::AppState;

/// Query parameters of an upload
#[derive(Debug, Deserialize)]
pub struct SubmitQuery {
    pub file_name: Option<String>,
    /// "xml" or "json"; otherwise taken from Content-Type or the file name
    pub format: Option<String>,
    /// Held submission this upload corrects
    pub supersedes: Option<String>,
}

/// Submission with its findings summary
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionDetail {
    #[serde(flatten)]
    pub submission: Submission,
    pub summary: FindingSummary,
}

impl From<Submission> for SubmissionDetail {
    fn from(submission: Submission) -> Self {
        let summary = submission.summary();
        Self { submission, summary }
    }
}

/// Listing filters
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub supplier_id: Option<String>,
    pub status: Option<String>,
    /// RFC 3339, inclusive
    pub from: Option<String>,
    /// RFC 3339, inclusive
    pub to: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    pub page_size: Option<i64>,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct ReprocessedRequest {
    pub new_submission_id: String,
}

/// POST /api/suppliers/:supplier_id/submissions
///
/// 201 with the receipt, 409 when the document was already submitted.
pub async fn submit(
    State(state): State<AppState>,
    Path(supplier_id): Path<String>,
    Query(query): Query<SubmitQuery>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<(StatusCode, Json<SubmitReceipt>)> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(rejection.body_text())
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    })?;

    let content_type = resolve_content_type(&query, &headers)?;
    let file_name = query
        .file_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| format!("submission-{}.{}", Utc::now().format("%Y%m%dT%H%M%S"), content_type.as_str()));
    let supersedes = query
        .supersedes
        .as_deref()
        .map(|id| parse_id(id, "submission"))
        .transpose()?;

    let receipt = state
        .service
        .submit(SubmitRequest {
            supplier_id,
            file_name,
            content_type,
            supersedes,
            content: body.into(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Explicit `format`, then Content-Type header, then file extension
fn resolve_content_type(query: &SubmitQuery, headers: &HeaderMap) -> ApiResult<ContentType> {
    if let Some(format) = &query.format {
        return format.parse().map_err(ApiError::BadRequest);
    }

    let from_header = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(ContentType::from_mime);
    if let Some(content_type) = from_header {
        return Ok(content_type);
    }

    query
        .file_name
        .as_deref()
        .and_then(ContentType::from_file_name)
        .ok_or_else(|| {
            ApiError::BadRequest(
                "Cannot determine document format: pass format=xml|json, a Content-Type header, \
                 or a file_name ending in .xml or .json"
                    .to_string(),
            )
        })
}

/// GET /api/submissions
pub async fn list_submissions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<SubmissionSummary>>> {
    let filter = SubmissionFilter {
        supplier_id: query.supplier_id.clone(),
        status: query
            .status
            .as_deref()
            .map(str::parse::<SubmissionStatus>)
            .transpose()
            .map_err(ApiError::BadRequest)?,
        submitted_from: parse_bound(query.from.as_deref(), "from")?,
        submitted_to: parse_bound(query.to.as_deref(), "to")?,
    };

    let page = state
        .service
        .list_submissions(&filter, query.page, query.page_size)
        .await?;

    Ok(Json(page))
}

fn parse_bound(text: Option<&str>, name: &str) -> ApiResult<Option<DateTime<Utc>>> {
    text.map(|t| {
        scorecard_common::time::parse_timestamp(t)
            .map_err(|e| ApiError::BadRequest(format!("Invalid '{}': {}", name, e)))
    })
    .transpose()
}

/// GET /api/submissions/:id
pub async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SubmissionDetail>> {
    let id = parse_id(&id, "submission")?;
    let submission = state.service.get_submission(id).await?;
    Ok(Json(submission.into()))
}

/// GET /api/submissions/:id/document
///
/// The uploaded bytes, unmodified.
pub async fn get_document(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    let id = parse_id(&id, "submission")?;
    let document = state.service.get_document(id).await?;

    let mime = match document.content_type {
        ContentType::Xml => "application/xml",
        ContentType::Json => "application/json",
    };
    let disposition = format!(
        "attachment; filename=\"{}\"",
        document.file_name.replace(['"', '\\', '\r', '\n'], "_")
    );

    Ok((
        [(header::CONTENT_TYPE, mime.to_string()), (header::CONTENT_DISPOSITION, disposition)],
        document.content,
    )
        .into_response())
}

/// POST /api/submissions/:id/reprocessed
pub async fn mark_reprocessed(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ReprocessedRequest>, JsonRejection>,
) -> ApiResult<Json<SubmissionDetail>> {
    let old_id = parse_id(&id, "submission")?;
    let request = json_body(body)?;
    let new_id = parse_id(&request.new_submission_id, "submission")?;

    let submission = state.service.mark_reprocessed(old_id, new_id).await?;
    Ok(Json(submission.into()))
}

/// Build submission routes
pub fn submission_routes() -> Router<AppState> {
    Router::new()
        .route("/api/suppliers/:supplier_id/submissions", post(submit))
        .route("/api/submissions", get(list_submissions))
        .route("/api/submissions/:id", get(get_submission))
        .route("/api/submissions/:id/document", get(get_document))
        .route("/api/submissions/:id/reprocessed", post(mark_reprocessed))
}
