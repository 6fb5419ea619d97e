//! Finding persistence
//!
//! Findings are append-only. The only mutation is the one-shot resolution.

use chrono::{DateTime, Utc};
use scorecard_common::time::format_timestamp;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{parse_column, parse_optional_timestamp, parse_stored_timestamp, parse_uuid};
use crate::error::{PipelineError, PipelineResult};
use crate::models::Finding;

const FINDING_COLUMNS: &str = "id, submission_id, seq, stage, severity, message, field, line_number, \
     event_index, created_at, is_resolved, resolution_note, resolved_by, resolved_at";

pub(crate) async fn insert_finding(conn: &mut SqliteConnection, finding: &Finding) -> PipelineResult<()> {
    sqlx::query(
        r#"
        INSERT INTO findings (
            id, submission_id, seq, stage, severity, message, field, line_number,
            event_index, created_at, is_resolved, resolution_note, resolved_by, resolved_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(finding.id.to_string())
    .bind(finding.submission_id.to_string())
    .bind(i64::from(finding.seq))
    .bind(finding.stage.as_str())
    .bind(finding.severity.as_str())
    .bind(&finding.message)
    .bind(&finding.field)
    .bind(finding.line_number.map(i64::from))
    .bind(finding.event_index.map(|i| i as i64))
    .bind(format_timestamp(&finding.created_at))
    .bind(finding.is_resolved)
    .bind(&finding.resolution_note)
    .bind(&finding.resolved_by)
    .bind(finding.resolved_at.as_ref().map(format_timestamp))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Findings of one submission in creation order
pub async fn list_for_submission(pool: &SqlitePool, submission_id: Uuid) -> PipelineResult<Vec<Finding>> {
    let sql = format!(
        "SELECT {} FROM findings WHERE submission_id = ? ORDER BY seq",
        FINDING_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(submission_id.to_string())
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(finding_from_row)
        .collect::<scorecard_common::Result<Vec<_>>>()?)
}

pub async fn get_finding(pool: &SqlitePool, id: Uuid) -> PipelineResult<Finding> {
    let sql = format!("SELECT {} FROM findings WHERE id = ?", FINDING_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("Finding {}", id)))?;

    Ok(finding_from_row(&row)?)
}

/// Resolve a finding exactly once
///
/// Compare-and-set on `is_resolved = 0`: of two concurrent resolutions one
/// wins and the other gets `AlreadyResolved`, leaving the first note intact.
/// Returns the owning submission id.
pub async fn append_resolution(
    pool: &SqlitePool,
    finding_id: Uuid,
    note: &str,
    resolved_by: &str,
    resolved_at: DateTime<Utc>,
) -> PipelineResult<Uuid> {
    let updated = sqlx::query(
        r#"
        UPDATE findings
        SET is_resolved = 1, resolution_note = ?, resolved_by = ?, resolved_at = ?
        WHERE id = ? AND is_resolved = 0
        "#,
    )
    .bind(note)
    .bind(resolved_by)
    .bind(format_timestamp(&resolved_at))
    .bind(finding_id.to_string())
    .execute(pool)
    .await?;

    let row: Option<(String,)> = sqlx::query_as("SELECT submission_id FROM findings WHERE id = ?")
        .bind(finding_id.to_string())
        .fetch_optional(pool)
        .await?;

    let Some((submission_id,)) = row else {
        return Err(PipelineError::NotFound(format!("Finding {}", finding_id)));
    };

    if updated.rows_affected() == 0 {
        return Err(PipelineError::AlreadyResolved(finding_id));
    }

    Ok(parse_uuid(&submission_id)?)
}

fn finding_from_row(row: &SqliteRow) -> scorecard_common::Result<Finding> {
    let id: String = row.try_get("id")?;
    let submission_id: String = row.try_get("submission_id")?;
    let seq: i64 = row.try_get("seq")?;
    let stage: String = row.try_get("stage")?;
    let severity: String = row.try_get("severity")?;
    let line_number: Option<i64> = row.try_get("line_number")?;
    let event_index: Option<i64> = row.try_get("event_index")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Finding {
        id: parse_uuid(&id)?,
        submission_id: parse_uuid(&submission_id)?,
        seq: seq as u32,
        stage: parse_column("stage", &stage)?,
        severity: parse_column("severity", &severity)?,
        message: row.try_get("message")?,
        field: row.try_get("field")?,
        line_number: line_number.map(|n| n as u32),
        event_index: event_index.map(|i| i as usize),
        created_at: parse_stored_timestamp(&created_at)?,
        is_resolved: row.try_get("is_resolved")?,
        resolution_note: row.try_get("resolution_note")?,
        resolved_by: row.try_get("resolved_by")?,
        resolved_at: parse_optional_timestamp(row.try_get("resolved_at")?)?,
    })
}
