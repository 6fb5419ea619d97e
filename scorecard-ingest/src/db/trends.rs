//! Persisted weekly trend rows (written by the rollup task)

use chrono::{DateTime, NaiveDate, Utc};
use scorecard_common::time::format_timestamp;
use scorecard_common::Error;
use sqlx::SqlitePool;

use crate::error::PipelineResult;
use crate::models::WeeklyBucket;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Upsert one row per bucket, all or nothing
pub async fn upsert_weekly_trends(
    pool: &SqlitePool,
    supplier_id: &str,
    buckets: &[WeeklyBucket],
    updated_at: DateTime<Utc>,
) -> PipelineResult<()> {
    let updated_at = format_timestamp(&updated_at);
    let mut tx = pool.begin().await?;

    for bucket in buckets {
        sqlx::query(
            r#"
            INSERT INTO weekly_trends (
                supplier_id, week_start, submissions, failed_submissions,
                error_findings, error_rate, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(supplier_id, week_start) DO UPDATE SET
                submissions = excluded.submissions,
                failed_submissions = excluded.failed_submissions,
                error_findings = excluded.error_findings,
                error_rate = excluded.error_rate,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(supplier_id)
        .bind(bucket.week_start.format(DATE_FORMAT).to_string())
        .bind(bucket.submissions as i64)
        .bind(bucket.failed_submissions as i64)
        .bind(bucket.error_findings as i64)
        .bind(bucket.error_rate)
        .bind(&updated_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Stored weeks of a supplier, oldest first
pub async fn list_weekly_trends(pool: &SqlitePool, supplier_id: &str) -> PipelineResult<Vec<WeeklyBucket>> {
    let rows: Vec<(String, i64, i64, i64, f64)> = sqlx::query_as(
        r#"
        SELECT week_start, submissions, failed_submissions, error_findings, error_rate
        FROM weekly_trends
        WHERE supplier_id = ?
        ORDER BY week_start
        "#,
    )
    .bind(supplier_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(week_start, submissions, failed, errors, error_rate)| -> PipelineResult<WeeklyBucket> {
            let week_start = NaiveDate::parse_from_str(&week_start, DATE_FORMAT)
                .map_err(|e| Error::Internal(format!("Corrupt week_start '{}': {}", week_start, e)))?;
            Ok(WeeklyBucket {
                week_start,
                submissions: submissions as u64,
                failed_submissions: failed as u64,
                error_findings: errors as u64,
                error_rate,
            })
        })
        .collect()
}
