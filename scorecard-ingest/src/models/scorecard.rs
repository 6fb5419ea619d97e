//! Scorecard report types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Submission counts within the window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionCounts {
    pub total: u64,
    /// No error findings (validated, held or reprocessed)
    pub valid: u64,
    /// At least one error finding (failed)
    pub invalid: u64,
    pub validated: u64,
    pub held: u64,
    pub failed: u64,
    pub reprocessed: u64,
    /// Not yet complete (received / processing)
    pub pending: u64,
}

/// Raised vs currently unresolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingTotals {
    pub total: u64,
    pub unresolved: u64,
}

/// Errors and warnings of one stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTotals {
    pub errors: u64,
    pub warnings: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageBreakdown {
    pub structure: StageTotals,
    pub field: StageTotals,
    pub sequence: StageTotals,
    pub aggregation: StageTotals,
}

/// One Monday-start week of trend data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyBucket {
    pub week_start: NaiveDate,
    pub submissions: u64,
    pub failed_submissions: u64,
    pub error_findings: u64,
    /// Percentage of the week's submissions that failed
    pub error_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorecardReport {
    pub supplier_id: String,
    pub window_days: u32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub submissions: SubmissionCounts,
    /// valid / total as a percentage, 0 when there are no submissions
    pub validity_rate: f64,
    pub errors: FindingTotals,
    pub warnings: FindingTotals,
    pub stages: StageBreakdown,
    /// Mean of completion - submission, in seconds
    pub avg_response_secs: f64,
    /// Resolved findings as a percentage of all findings
    pub resolution_rate: f64,
    pub weekly: Vec<WeeklyBucket>,
}
