//! Scorecard aggregation
//!
//! A pure read over submissions and findings within a trailing window. The
//! rollup refresh stores the headline numbers on the supplier row and the
//! weekly buckets in `weekly_trends` for dashboards.

use chrono::{DateTime, Duration, Utc};
use scorecard_common::time::{format_timestamp, week_start};
use sqlx::SqlitePool;

use crate::db::{self, parse_column, parse_optional_timestamp, parse_stored_timestamp};
use crate::error::PipelineResult;
use crate::models::{
    FindingTotals, ScorecardReport, Severity, Stage, StageBreakdown, StageTotals, SubmissionCounts,
    SubmissionStatus, SupplierRollup, WeeklyBucket,
};

/// Share of the compliance score carried by validity (the rest is resolution)
const VALIDITY_WEIGHT: f64 = 0.7;

/// Submission facts the report needs
#[derive(Debug, Clone)]
pub struct SubmissionFacts {
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Finding facts the report needs, tagged with the owning submission's time
#[derive(Debug, Clone)]
pub struct FindingFacts {
    pub stage: Stage,
    pub severity: Severity,
    pub is_resolved: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Scorecard for `supplier_id` over the `window_days` ending at `now`
pub async fn compute_scorecard(
    pool: &SqlitePool,
    supplier_id: &str,
    window_days: u32,
    now: DateTime<Utc>,
) -> PipelineResult<ScorecardReport> {
    // Unknown suppliers are a 404, not an empty report
    db::suppliers::get_supplier(pool, supplier_id).await?;

    let window_start = now - Duration::days(i64::from(window_days));
    let from = format_timestamp(&window_start);
    let to = format_timestamp(&now);

    let submission_rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
        r#"
        SELECT status, submitted_at, completed_at
        FROM submissions
        WHERE supplier_id = ? AND submitted_at >= ? AND submitted_at <= ?
        "#,
    )
    .bind(supplier_id)
    .bind(&from)
    .bind(&to)
    .fetch_all(pool)
    .await?;

    let finding_rows: Vec<(String, String, bool, String)> = sqlx::query_as(
        r#"
        SELECT f.stage, f.severity, f.is_resolved, s.submitted_at
        FROM findings f
        JOIN submissions s ON s.id = f.submission_id
        WHERE s.supplier_id = ? AND s.submitted_at >= ? AND s.submitted_at <= ?
        "#,
    )
    .bind(supplier_id)
    .bind(&from)
    .bind(&to)
    .fetch_all(pool)
    .await?;

    let mut submissions = Vec::with_capacity(submission_rows.len());
    for (status, submitted_at, completed_at) in submission_rows {
        submissions.push(SubmissionFacts {
            status: parse_column("status", &status)?,
            submitted_at: parse_stored_timestamp(&submitted_at)?,
            completed_at: parse_optional_timestamp(completed_at)?,
        });
    }

    let mut findings = Vec::with_capacity(finding_rows.len());
    for (stage, severity, is_resolved, submitted_at) in finding_rows {
        findings.push(FindingFacts {
            stage: parse_column("stage", &stage)?,
            severity: parse_column("severity", &severity)?,
            is_resolved,
            submitted_at: parse_stored_timestamp(&submitted_at)?,
        });
    }

    Ok(build_report(supplier_id, window_days, window_start, now, &submissions, &findings))
}

/// Assemble a report from already-loaded facts
pub fn build_report(
    supplier_id: &str,
    window_days: u32,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    submissions: &[SubmissionFacts],
    findings: &[FindingFacts],
) -> ScorecardReport {
    let mut counts = SubmissionCounts::default();
    let mut response_secs = Vec::new();

    for submission in submissions {
        counts.total += 1;
        match submission.status {
            SubmissionStatus::Validated => counts.validated += 1,
            SubmissionStatus::Held => counts.held += 1,
            SubmissionStatus::Reprocessed => counts.reprocessed += 1,
            SubmissionStatus::Failed => counts.failed += 1,
            SubmissionStatus::Received | SubmissionStatus::Processing => counts.pending += 1,
        }
        if submission.status.is_valid() {
            counts.valid += 1;
        } else if submission.status == SubmissionStatus::Failed {
            counts.invalid += 1;
        }
        if let Some(completed_at) = submission.completed_at {
            let elapsed = completed_at - submission.submitted_at;
            response_secs.push(elapsed.num_milliseconds().max(0) as f64 / 1000.0);
        }
    }

    let mut errors = FindingTotals::default();
    let mut warnings = FindingTotals::default();
    let mut stages = StageBreakdown::default();
    let mut resolved = 0u64;

    for finding in findings {
        let totals = match finding.severity {
            Severity::Error => &mut errors,
            Severity::Warning => &mut warnings,
        };
        totals.total += 1;
        if finding.is_resolved {
            resolved += 1;
        } else {
            totals.unresolved += 1;
        }

        let stage = stage_totals(&mut stages, finding.stage);
        match finding.severity {
            Severity::Error => stage.errors += 1,
            Severity::Warning => stage.warnings += 1,
        }
    }

    let avg_response_secs = if response_secs.is_empty() {
        0.0
    } else {
        response_secs.iter().sum::<f64>() / response_secs.len() as f64
    };

    ScorecardReport {
        supplier_id: supplier_id.to_string(),
        window_days,
        window_start,
        window_end,
        submissions: counts,
        validity_rate: percentage(counts.valid, counts.total),
        errors,
        warnings,
        stages,
        avg_response_secs: round2(avg_response_secs),
        resolution_rate: percentage(resolved, errors.total + warnings.total),
        weekly: weekly_buckets(window_start, window_end, submissions, findings),
    }
}

fn stage_totals(stages: &mut StageBreakdown, stage: Stage) -> &mut StageTotals {
    match stage {
        Stage::Structure => &mut stages.structure,
        Stage::Field => &mut stages.field,
        Stage::Sequence => &mut stages.sequence,
        Stage::Aggregation => &mut stages.aggregation,
    }
}

/// Monday-start weeks covering the window, empty weeks included
fn weekly_buckets(
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    submissions: &[SubmissionFacts],
    findings: &[FindingFacts],
) -> Vec<WeeklyBucket> {
    let first = week_start(&window_start);
    let last = week_start(&window_end);

    let mut buckets = Vec::new();
    let mut week = first;
    while week <= last {
        buckets.push(WeeklyBucket {
            week_start: week,
            submissions: 0,
            failed_submissions: 0,
            error_findings: 0,
            error_rate: 0.0,
        });
        week += Duration::days(7);
    }

    let len = buckets.len();
    let index_of = |ts: &DateTime<Utc>| -> Option<usize> {
        let offset = (week_start(ts) - first).num_days();
        usize::try_from(offset / 7).ok().filter(|i| *i < len)
    };

    for submission in submissions {
        if let Some(i) = index_of(&submission.submitted_at) {
            buckets[i].submissions += 1;
            if submission.status == SubmissionStatus::Failed {
                buckets[i].failed_submissions += 1;
            }
        }
    }

    for finding in findings.iter().filter(|f| f.severity == Severity::Error) {
        if let Some(i) = index_of(&finding.submitted_at) {
            buckets[i].error_findings += 1;
        }
    }

    for bucket in &mut buckets {
        bucket.error_rate = percentage(bucket.failed_submissions, bucket.submissions);
    }

    buckets
}

/// `part / whole` as a percentage rounded to two decimals, 0 for an empty whole
fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 * 100.0 / whole as f64)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Headline numbers stored on the supplier row
pub fn rollup_from_report(report: &ScorecardReport) -> SupplierRollup {
    if report.submissions.total == 0 {
        return SupplierRollup {
            data_accuracy: 0.0,
            error_rate: 0.0,
            compliance_score: 0.0,
            avg_response_secs: 0.0,
        };
    }

    let accuracy = report.validity_rate;
    SupplierRollup {
        data_accuracy: accuracy,
        error_rate: round2(100.0 - accuracy),
        compliance_score: round2(
            VALIDITY_WEIGHT * accuracy + (1.0 - VALIDITY_WEIGHT) * report.resolution_rate,
        ),
        avg_response_secs: report.avg_response_secs,
    }
}

/// Recompute and store one supplier's rollup and weekly trend rows
pub async fn refresh_supplier_rollup(
    pool: &SqlitePool,
    supplier_id: &str,
    window_days: u32,
    now: DateTime<Utc>,
) -> PipelineResult<SupplierRollup> {
    let report = compute_scorecard(pool, supplier_id, window_days, now).await?;
    let rollup = rollup_from_report(&report);

    let last: Option<(Option<String>,)> =
        sqlx::query_as("SELECT MAX(submitted_at) FROM submissions WHERE supplier_id = ?")
            .bind(supplier_id)
            .fetch_optional(pool)
            .await?;
    let last_submission_at = parse_optional_timestamp(last.and_then(|(ts,)| ts))?;

    db::suppliers::write_rollup(pool, supplier_id, &rollup, last_submission_at, now).await?;
    db::trends::upsert_weekly_trends(pool, supplier_id, &report.weekly, now).await?;

    tracing::debug!(
        supplier_id,
        data_accuracy = rollup.data_accuracy,
        compliance_score = rollup.compliance_score,
        "Supplier rollup refreshed"
    );

    Ok(rollup)
}

/// Refresh every registered supplier; failures are logged and skipped
///
/// Returns the number of suppliers refreshed.
pub async fn refresh_all(pool: &SqlitePool, window_days: u32, now: DateTime<Utc>) -> PipelineResult<usize> {
    let supplier_ids = db::suppliers::list_supplier_ids(pool).await?;
    let mut refreshed = 0;

    for supplier_id in &supplier_ids {
        match refresh_supplier_rollup(pool, supplier_id, window_days, now).await {
            Ok(_) => refreshed += 1,
            Err(e) => tracing::warn!(supplier_id = %supplier_id, error = %e, "Rollup refresh failed"),
        }
    }

    tracing::info!(refreshed, total = supplier_ids.len(), "Supplier rollups refreshed");
    Ok(refreshed)
}
