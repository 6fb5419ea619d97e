//! Supplier registry
//!
//! Rollup columns are written only by the scorecard aggregator.

use chrono::{DateTime, Utc};
use scorecard_common::time::format_timestamp;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{parse_optional_timestamp, parse_stored_timestamp};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{Supplier, SupplierRollup};

const SUPPLIER_COLUMNS: &str = "id, display_name, data_accuracy, error_rate, compliance_score, \
     avg_response_secs, last_submission_at, rollup_updated_at, created_at, updated_at";

/// Register a supplier or rename an existing one
pub async fn upsert_supplier(pool: &SqlitePool, id: &str, display_name: Option<&str>) -> PipelineResult<Supplier> {
    let now = format_timestamp(&Utc::now());

    sqlx::query(
        r#"
        INSERT INTO suppliers (id, display_name, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            display_name = excluded.display_name,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(id)
    .bind(display_name)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get_supplier(pool, id).await
}

pub async fn get_supplier(pool: &SqlitePool, id: &str) -> PipelineResult<Supplier> {
    let sql = format!("SELECT {} FROM suppliers WHERE id = ?", SUPPLIER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("Supplier '{}'", id)))?;

    Ok(supplier_from_row(&row)?)
}

pub async fn list_suppliers(pool: &SqlitePool) -> PipelineResult<Vec<Supplier>> {
    let sql = format!("SELECT {} FROM suppliers ORDER BY id", SUPPLIER_COLUMNS);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    Ok(rows
        .iter()
        .map(supplier_from_row)
        .collect::<scorecard_common::Result<Vec<_>>>()?)
}

pub async fn list_supplier_ids(pool: &SqlitePool) -> PipelineResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM suppliers ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Store freshly computed rollups
pub async fn write_rollup(
    pool: &SqlitePool,
    id: &str,
    rollup: &SupplierRollup,
    last_submission_at: Option<DateTime<Utc>>,
    computed_at: DateTime<Utc>,
) -> PipelineResult<()> {
    let updated = sqlx::query(
        r#"
        UPDATE suppliers SET
            data_accuracy = ?,
            error_rate = ?,
            compliance_score = ?,
            avg_response_secs = ?,
            last_submission_at = ?,
            rollup_updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(rollup.data_accuracy)
    .bind(rollup.error_rate)
    .bind(rollup.compliance_score)
    .bind(rollup.avg_response_secs)
    .bind(last_submission_at.as_ref().map(format_timestamp))
    .bind(format_timestamp(&computed_at))
    .bind(id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(PipelineError::NotFound(format!("Supplier '{}'", id)));
    }

    Ok(())
}

fn supplier_from_row(row: &SqliteRow) -> scorecard_common::Result<Supplier> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Supplier {
        id: row.try_get("id")?,
        display_name: row.try_get("display_name")?,
        data_accuracy: row.try_get("data_accuracy")?,
        error_rate: row.try_get("error_rate")?,
        compliance_score: row.try_get("compliance_score")?,
        avg_response_secs: row.try_get("avg_response_secs")?,
        last_submission_at: parse_optional_timestamp(row.try_get("last_submission_at")?)?,
        rollup_updated_at: parse_optional_timestamp(row.try_get("rollup_updated_at")?)?,
        created_at: parse_stored_timestamp(&created_at)?,
        updated_at: parse_stored_timestamp(&updated_at)?,
    })
}
