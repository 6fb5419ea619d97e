//! Submission persistence
//!
//! A submission, its events, findings and raw document are written in one
//! transaction. Unresolved error/warning counts are never stored; every read
//! computes them from `findings`.

use chrono::{DateTime, Utc};
use scorecard_common::time::format_timestamp;
use scorecard_common::Error;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{
    findings, is_unique_violation, parse_column, parse_optional_timestamp, parse_optional_uuid,
    parse_stored_timestamp, parse_uuid,
};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{ContentType, EpcisEvent, Submission, SubmissionStatus, SubmissionSummary};
use crate::pagination::{calculate_pagination, Page};
use crate::services::duplicate_detector::DuplicateDetector;

const SUBMISSION_COLUMNS: &str = r#"
    s.id, s.supplier_id, s.file_name, s.content_type, s.file_size, s.content_hash,
    s.instance_identifier, s.status, s.submitted_at, s.processing_started_at,
    s.completed_at, s.supersedes, s.superseded_by,
    (SELECT COUNT(*) FROM findings f
      WHERE f.submission_id = s.id AND f.severity = 'error' AND f.is_resolved = 0) AS error_count,
    (SELECT COUNT(*) FROM findings f
      WHERE f.submission_id = s.id AND f.severity = 'warning' AND f.is_resolved = 0) AS warning_count
"#;

/// Listing filter; every field is optional and the bounds are inclusive
#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub supplier_id: Option<String>,
    pub status: Option<SubmissionStatus>,
    pub submitted_from: Option<DateTime<Utc>>,
    pub submitted_to: Option<DateTime<Utc>>,
}

/// Raw uploaded document
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub file_name: String,
    pub content_type: ContentType,
    pub content: Vec<u8>,
}

/// Persist a fully processed submission
///
/// When the submission is `validated` and supersedes a `held` submission of
/// the same supplier, the held one moves to `reprocessed` in the same
/// transaction. A unique-index conflict (a concurrent upload of the same
/// document won) is reported as a duplicate of the winner.
pub async fn create_submission(pool: &SqlitePool, submission: &Submission, raw: &[u8]) -> PipelineResult<()> {
    let mut tx = pool.begin().await?;

    if let Err(err) = write_submission(&mut tx, submission, raw).await {
        tx.rollback().await?;
        if is_unique_conflict(&err) {
            return Err(duplicate_after_conflict(pool, submission).await);
        }
        return Err(err);
    }

    tx.commit().await?;

    tracing::debug!(
        submission_id = %submission.id,
        supplier_id = %submission.supplier_id,
        status = %submission.status,
        events = submission.events.len(),
        findings = submission.findings.len(),
        "Submission stored"
    );

    Ok(())
}

async fn write_submission(conn: &mut SqliteConnection, submission: &Submission, raw: &[u8]) -> PipelineResult<()> {
    let now = format_timestamp(&Utc::now());
    let id = submission.id.to_string();

    // A correction may only replace the same supplier's upload
    let superseded_status = match submission.supersedes {
        Some(old_id) => {
            let (old_supplier, old_status) = load_state(conn, old_id).await?;
            if old_supplier != submission.supplier_id {
                return Err(PipelineError::InvalidInput(format!(
                    "Submission {} belongs to another supplier",
                    old_id
                )));
            }
            Some((old_id, old_status))
        }
        None => None,
    };

    sqlx::query(
        "INSERT INTO suppliers (id, created_at, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(id) DO NOTHING",
    )
    .bind(&submission.supplier_id)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO submissions (
            id, supplier_id, file_name, content_type, file_size, content_hash,
            instance_identifier, status, submitted_at, processing_started_at,
            completed_at, supersedes, superseded_by
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&submission.supplier_id)
    .bind(&submission.file_name)
    .bind(submission.content_type.as_str())
    .bind(submission.file_size)
    .bind(&submission.content_hash)
    .bind(&submission.instance_identifier)
    .bind(submission.status.as_str())
    .bind(format_timestamp(&submission.submitted_at))
    .bind(submission.processing_started_at.as_ref().map(format_timestamp))
    .bind(submission.completed_at.as_ref().map(format_timestamp))
    .bind(submission.supersedes.map(|u| u.to_string()))
    .bind(submission.superseded_by.map(|u| u.to_string()))
    .execute(&mut *conn)
    .await?;

    for event in &submission.events {
        insert_event(conn, &id, event).await?;
    }

    for finding in &submission.findings {
        findings::insert_finding(conn, finding).await?;
    }

    sqlx::query("INSERT INTO submission_documents (submission_id, content, stored_at) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(raw)
        .bind(&now)
        .execute(&mut *conn)
        .await?;

    if let (SubmissionStatus::Validated, Some((old_id, old_status))) = (submission.status, superseded_status) {
        if old_status == SubmissionStatus::Held {
            link_reprocessed(conn, old_id, submission.id).await?;
        } else {
            tracing::info!(
                submission_id = %submission.id,
                supersedes = %old_id,
                old_status = %old_status,
                "Superseded submission not held; recorded link only"
            );
        }
    }

    Ok(())
}

async fn insert_event(conn: &mut SqliteConnection, submission_id: &str, event: &EpcisEvent) -> PipelineResult<()> {
    let payload = serde_json::to_string(event)
        .map_err(|e| Error::Internal(format!("Failed to serialize event {}: {}", event.index, e)))?;

    sqlx::query(
        r#"
        INSERT INTO submission_events (
            submission_id, event_index, event_kind, event_time, action, biz_step, line_number, payload
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(submission_id)
    .bind(event.index as i64)
    .bind(event.kind.as_str())
    .bind(&event.event_time)
    .bind(&event.action)
    .bind(&event.biz_step)
    .bind(event.line.map(i64::from))
    .bind(payload)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn is_unique_conflict(err: &PipelineError) -> bool {
    matches!(err, PipelineError::Store(Error::Database(db_err)) if is_unique_violation(db_err))
}

async fn duplicate_after_conflict(pool: &SqlitePool, submission: &Submission) -> PipelineError {
    let detector = DuplicateDetector::new(pool.clone());
    match detector
        .find_original(
            &submission.supplier_id,
            &submission.content_hash,
            submission.instance_identifier.as_deref(),
        )
        .await
    {
        Ok(Some(dup)) => dup.into(),
        Ok(None) => Error::Internal(format!(
            "Unique constraint conflict for submission {} but no live original found",
            submission.id
        ))
        .into(),
        Err(err) => err,
    }
}

/// Supplier and status of a submission
async fn load_state(conn: &mut SqliteConnection, id: Uuid) -> PipelineResult<(String, SubmissionStatus)> {
    let row: Option<(String, String)> = sqlx::query_as("SELECT supplier_id, status FROM submissions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    let (supplier_id, status) = row.ok_or_else(|| PipelineError::NotFound(format!("Submission {}", id)))?;
    Ok((supplier_id, parse_column("status", &status)?))
}

/// `held → reprocessed` on the old row, linked both ways
async fn link_reprocessed(conn: &mut SqliteConnection, old_id: Uuid, new_id: Uuid) -> PipelineResult<()> {
    let updated = sqlx::query(
        "UPDATE submissions SET status = 'reprocessed', superseded_by = ?
         WHERE id = ? AND status = 'held'",
    )
    .bind(new_id.to_string())
    .bind(old_id.to_string())
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        let (_, current) = load_state(conn, old_id).await?;
        return Err(PipelineError::InvalidTransition {
            from: current,
            to: SubmissionStatus::Reprocessed,
        });
    }

    sqlx::query("UPDATE submissions SET supersedes = ? WHERE id = ?")
        .bind(old_id.to_string())
        .bind(new_id.to_string())
        .execute(&mut *conn)
        .await?;

    tracing::info!(old = %old_id, new = %new_id, "Held submission marked reprocessed");

    Ok(())
}

/// Mark `old_id` (held) as reprocessed by the validated `new_id`
pub async fn mark_reprocessed(pool: &SqlitePool, old_id: Uuid, new_id: Uuid) -> PipelineResult<()> {
    if old_id == new_id {
        return Err(PipelineError::InvalidInput(
            "A submission cannot supersede itself".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let (old_supplier, old_status) = load_state(&mut tx, old_id).await?;
    let (new_supplier, new_status) = load_state(&mut tx, new_id).await?;

    if old_supplier != new_supplier {
        return Err(PipelineError::InvalidInput(format!(
            "Submission {} belongs to supplier '{}', not '{}'",
            new_id, new_supplier, old_supplier
        )));
    }

    if new_status != SubmissionStatus::Validated {
        return Err(PipelineError::InvalidInput(format!(
            "Replacement submission {} is {}, not validated",
            new_id, new_status
        )));
    }

    if !old_status.can_transition_to(SubmissionStatus::Reprocessed) {
        return Err(PipelineError::InvalidTransition {
            from: old_status,
            to: SubmissionStatus::Reprocessed,
        });
    }

    link_reprocessed(&mut tx, old_id, new_id).await?;
    tx.commit().await?;

    Ok(())
}

/// Full submission with events and findings
pub async fn get_submission(pool: &SqlitePool, id: Uuid) -> PipelineResult<Submission> {
    let sql = format!("SELECT {} FROM submissions s WHERE s.id = ?", SUBMISSION_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("Submission {}", id)))?;

    let summary = summary_from_row(&row)?;
    let content_hash: String = row.try_get("content_hash")?;
    let instance_identifier: Option<String> = row.try_get("instance_identifier")?;
    let processing_started_at = parse_optional_timestamp(row.try_get("processing_started_at")?)?;

    let events = load_events(pool, id).await?;
    let findings = findings::list_for_submission(pool, id).await?;

    Ok(Submission {
        id: summary.id,
        supplier_id: summary.supplier_id,
        file_name: summary.file_name,
        content_type: summary.content_type,
        file_size: summary.file_size,
        content_hash,
        instance_identifier,
        status: summary.status,
        submitted_at: summary.submitted_at,
        processing_started_at,
        completed_at: summary.completed_at,
        supersedes: summary.supersedes,
        superseded_by: summary.superseded_by,
        error_count: summary.error_count,
        warning_count: summary.warning_count,
        events,
        findings,
    })
}

async fn load_events(pool: &SqlitePool, id: Uuid) -> PipelineResult<Vec<EpcisEvent>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT payload FROM submission_events WHERE submission_id = ? ORDER BY event_index",
    )
    .bind(id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(payload,)| {
            serde_json::from_str::<EpcisEvent>(&payload)
                .map_err(|e| PipelineError::from(Error::Internal(format!("Corrupt event payload: {}", e))))
        })
        .collect()
}

/// Raw bytes exactly as uploaded
pub async fn get_document(pool: &SqlitePool, id: Uuid) -> PipelineResult<StoredDocument> {
    let row: Option<(String, String, Vec<u8>)> = sqlx::query_as(
        r#"
        SELECT s.file_name, s.content_type, d.content
        FROM submissions s
        JOIN submission_documents d ON d.submission_id = s.id
        WHERE s.id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    let (file_name, content_type, content) =
        row.ok_or_else(|| PipelineError::NotFound(format!("Document for submission {}", id)))?;

    Ok(StoredDocument {
        file_name,
        content_type: parse_column("content_type", &content_type)?,
        content,
    })
}

/// Filtered page of submissions, newest first
pub async fn list_submissions(
    pool: &SqlitePool,
    filter: &SubmissionFilter,
    page: i64,
    page_size: Option<i64>,
) -> PipelineResult<Page<SubmissionSummary>> {
    let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM submissions s WHERE 1 = 1");
    push_filters(&mut count_query, filter);
    let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    let pagination = calculate_pagination(total, page, page_size);

    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM submissions s WHERE 1 = 1",
        SUBMISSION_COLUMNS
    ));
    push_filters(&mut query, filter);
    query
        .push(" ORDER BY s.submitted_at DESC, s.id LIMIT ")
        .push_bind(pagination.page_size)
        .push(" OFFSET ")
        .push_bind(pagination.offset);

    let rows = query.build().fetch_all(pool).await?;
    let items = rows
        .iter()
        .map(summary_from_row)
        .collect::<scorecard_common::Result<Vec<_>>>()?;

    Ok(Page::new(items, total, pagination))
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &SubmissionFilter) {
    if let Some(supplier_id) = &filter.supplier_id {
        query.push(" AND s.supplier_id = ").push_bind(supplier_id.clone());
    }
    if let Some(status) = filter.status {
        query.push(" AND s.status = ").push_bind(status.as_str());
    }
    if let Some(from) = &filter.submitted_from {
        query.push(" AND s.submitted_at >= ").push_bind(format_timestamp(from));
    }
    if let Some(to) = &filter.submitted_to {
        query.push(" AND s.submitted_at <= ").push_bind(format_timestamp(to));
    }
}

fn summary_from_row(row: &SqliteRow) -> scorecard_common::Result<SubmissionSummary> {
    let id: String = row.try_get("id")?;
    let content_type: String = row.try_get("content_type")?;
    let status: String = row.try_get("status")?;
    let submitted_at: String = row.try_get("submitted_at")?;

    Ok(SubmissionSummary {
        id: parse_uuid(&id)?,
        supplier_id: row.try_get("supplier_id")?,
        file_name: row.try_get("file_name")?,
        content_type: parse_column("content_type", &content_type)?,
        file_size: row.try_get("file_size")?,
        status: parse_column("status", &status)?,
        submitted_at: parse_stored_timestamp(&submitted_at)?,
        completed_at: parse_optional_timestamp(row.try_get("completed_at")?)?,
        supersedes: parse_optional_uuid(row.try_get("supersedes")?)?,
        superseded_by: parse_optional_uuid(row.try_get("superseded_by")?)?,
        error_count: row.try_get("error_count")?,
        warning_count: row.try_get("warning_count")?,
    })
}
