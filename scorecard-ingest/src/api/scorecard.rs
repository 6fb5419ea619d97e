//! Scorecard endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::models::{ScorecardReport, SupplierRollup};
use crate::services::scorecard;
use crate::AppState;

/// Ten years
const MAX_WINDOW_DAYS: u32 = 3650;

#[derive(Debug, Deserialize)]
pub struct ScorecardQuery {
    /// Defaults to the configured scorecard window
    pub window_days: Option<u32>,
}

fn window_days(state: &AppState, requested: Option<u32>) -> ApiResult<u32> {
    let days = requested.unwrap_or(state.config.scorecard_window_days);
    if days == 0 || days > MAX_WINDOW_DAYS {
        return Err(ApiError::BadRequest(format!(
            "window_days must be between 1 and {}",
            MAX_WINDOW_DAYS
        )));
    }
    Ok(days)
}

/// GET /api/suppliers/:supplier_id/scorecard
pub async fn get_scorecard(
    State(state): State<AppState>,
    Path(supplier_id): Path<String>,
    Query(query): Query<ScorecardQuery>,
) -> ApiResult<Json<ScorecardReport>> {
    let days = window_days(&state, query.window_days)?;
    let report = scorecard::compute_scorecard(&state.db, &supplier_id, days, Utc::now()).await?;
    Ok(Json(report))
}

/// POST /api/suppliers/:supplier_id/scorecard/refresh
///
/// Recompute the stored rollup now instead of waiting for the next tick.
pub async fn refresh_scorecard(
    State(state): State<AppState>,
    Path(supplier_id): Path<String>,
) -> ApiResult<Json<SupplierRollup>> {
    let days = state.config.scorecard_window_days;
    let rollup = scorecard::refresh_supplier_rollup(&state.db, &supplier_id, days, Utc::now()).await?;
    Ok(Json(rollup))
}

/// Build scorecard routes
pub fn scorecard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/suppliers/:supplier_id/scorecard", get(get_scorecard))
        .route("/api/suppliers/:supplier_id/scorecard/refresh", post(refresh_scorecard))
}
