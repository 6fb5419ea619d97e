//! Supplier registry entry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supplier with its derived rollups
///
/// Rollup fields are `None` until the scorecard aggregator has run for the
/// supplier; nothing else writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub display_name: Option<String>,
    /// Percentage of submissions without error findings
    pub data_accuracy: Option<f64>,
    pub error_rate: Option<f64>,
    pub compliance_score: Option<f64>,
    pub avg_response_secs: Option<f64>,
    pub last_submission_at: Option<DateTime<Utc>>,
    pub rollup_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived values written by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupplierRollup {
    pub data_accuracy: f64,
    pub error_rate: f64,
    pub compliance_score: f64,
    pub avg_response_secs: f64,
}
