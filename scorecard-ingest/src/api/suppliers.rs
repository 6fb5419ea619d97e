//! Supplier registry endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::json_body;
use crate::db;
use crate::error::ApiResult;
use crate::models::{Supplier, WeeklyBucket};
use crate::services::validate_supplier_id;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SupplierUpdate {
    pub display_name: Option<String>,
}

/// GET /api/suppliers
pub async fn list_suppliers(State(state): State<AppState>) -> ApiResult<Json<Vec<Supplier>>> {
    Ok(Json(db::suppliers::list_suppliers(&state.db).await?))
}

/// GET /api/suppliers/:supplier_id
pub async fn get_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<String>,
) -> ApiResult<Json<Supplier>> {
    Ok(Json(db::suppliers::get_supplier(&state.db, &supplier_id).await?))
}

/// PUT /api/suppliers/:supplier_id
///
/// Registers the supplier, or updates its display name.
pub async fn put_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<String>,
    body: Result<Json<SupplierUpdate>, JsonRejection>,
) -> ApiResult<Json<Supplier>> {
    validate_supplier_id(&supplier_id)?;
    let update = json_body(body)?;
    let display_name = update
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let supplier = db::suppliers::upsert_supplier(&state.db, &supplier_id, display_name).await?;
    tracing::info!(supplier_id = %supplier.id, "Supplier registered");

    Ok(Json(supplier))
}

/// GET /api/suppliers/:supplier_id/trends
///
/// Weekly rows stored by the last rollup refresh.
pub async fn get_trends(
    State(state): State<AppState>,
    Path(supplier_id): Path<String>,
) -> ApiResult<Json<Vec<WeeklyBucket>>> {
    db::suppliers::get_supplier(&state.db, &supplier_id).await?;
    Ok(Json(db::trends::list_weekly_trends(&state.db, &supplier_id).await?))
}

/// Build supplier routes
pub fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/api/suppliers", get(list_suppliers))
        .route("/api/suppliers/:supplier_id", get(get_supplier).put(put_supplier))
        .route("/api/suppliers/:supplier_id/trends", get(get_trends))
}
