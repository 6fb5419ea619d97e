//! Finding endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::submissions::SubmissionDetail;
use super::{json_body, parse_id};
use crate::db;
use crate::error::ApiResult;
use crate::models::Finding;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub note: String,
    pub resolved_by: String,
}

/// GET /api/findings/:id
pub async fn get_finding(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Finding>> {
    let id = parse_id(&id, "finding")?;
    Ok(Json(db::findings::get_finding(&state.db, id).await?))
}

/// POST /api/findings/:id/resolve
///
/// Returns the owning submission with recomputed counts. 404 for an
/// unknown finding, 409 when it was already resolved.
pub async fn resolve_finding(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ResolveRequest>, JsonRejection>,
) -> ApiResult<Json<SubmissionDetail>> {
    let id = parse_id(&id, "finding")?;
    let request = json_body(body)?;

    let submission = state
        .service
        .resolve_finding(id, &request.note, &request.resolved_by)
        .await?;

    Ok(Json(submission.into()))
}

/// Build finding routes
pub fn finding_routes() -> Router<AppState> {
    Router::new()
        .route("/api/findings/:id", get(get_finding))
        .route("/api/findings/:id/resolve", post(resolve_finding))
}
