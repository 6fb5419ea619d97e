//! Validation findings
//!
//! Findings are data, not control flow: the rule engine emits them, the
//! record store appends them, and only the resolve operation ever touches
//! them again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Rule stage that produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Structure,
    Field,
    Sequence,
    Aggregation,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Structure, Stage::Field, Stage::Sequence, Stage::Aggregation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Structure => "structure",
            Stage::Field => "field",
            Stage::Sequence => "sequence",
            Stage::Aggregation => "aggregation",
        }
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| format!("unknown stage '{}'", s))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// Finding as produced by the rule engine, before it is tied to a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFinding {
    pub stage: Stage,
    pub severity: Severity,
    pub message: String,
    /// Field the finding is about (field stage ordering key)
    pub field: Option<String>,
    pub line_number: Option<u32>,
    pub event_index: Option<usize>,
}

impl NewFinding {
    pub fn error(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            severity: Severity::Error,
            message: message.into(),
            field: None,
            line_number: None,
            event_index: None,
        }
    }

    pub fn warning(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(stage, message)
        }
    }

    pub fn at_line(mut self, line: Option<u32>) -> Self {
        self.line_number = line;
        self
    }

    pub fn for_event(mut self, index: usize) -> Self {
        self.event_index = Some(index);
        self
    }

    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Persisted finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    pub submission_id: Uuid,
    /// Position within the submission's findings
    pub seq: u32,
    pub stage: Stage,
    pub severity: Severity,
    pub message: String,
    pub field: Option<String>,
    pub line_number: Option<u32>,
    pub event_index: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub is_resolved: bool,
    pub resolution_note: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Finding {
    pub fn from_new(submission_id: Uuid, seq: u32, new: NewFinding, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            submission_id,
            seq,
            stage: new.stage,
            severity: new.severity,
            message: new.message,
            field: new.field,
            line_number: new.line_number,
            event_index: new.event_index,
            created_at,
            is_resolved: false,
            resolution_note: None,
            resolved_by: None,
            resolved_at: None,
        }
    }
}

/// Per-stage finding counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub structure: usize,
    pub field: usize,
    pub sequence: usize,
    pub aggregation: usize,
}

impl StageCounts {
    pub fn add(&mut self, stage: Stage) {
        match stage {
            Stage::Structure => self.structure += 1,
            Stage::Field => self.field += 1,
            Stage::Sequence => self.sequence += 1,
            Stage::Aggregation => self.aggregation += 1,
        }
    }
}

/// Totals over one submission's findings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingSummary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub unresolved_errors: usize,
    pub unresolved_warnings: usize,
    pub by_stage: StageCounts,
    pub has_structure_errors: bool,
    pub has_sequence_errors: bool,
}

impl FindingSummary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = FindingSummary {
            total: findings.len(),
            ..Default::default()
        };

        for finding in findings {
            summary.by_stage.add(finding.stage);
            match finding.severity {
                Severity::Error => {
                    summary.errors += 1;
                    if !finding.is_resolved {
                        summary.unresolved_errors += 1;
                    }
                    match finding.stage {
                        Stage::Structure => summary.has_structure_errors = true,
                        Stage::Sequence => summary.has_sequence_errors = true,
                        _ => {}
                    }
                }
                Severity::Warning => {
                    summary.warnings += 1;
                    if !finding.is_resolved {
                        summary.unresolved_warnings += 1;
                    }
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(stage: Stage, severity: Severity, resolved: bool) -> Finding {
        let new = NewFinding {
            severity,
            ..NewFinding::error(stage, "x")
        };
        let mut f = Finding::from_new(Uuid::new_v4(), 0, new, Utc::now());
        f.is_resolved = resolved;
        f
    }

    #[test]
    fn test_summary_counts() {
        let findings = vec![
            finding(Stage::Structure, Severity::Error, false),
            finding(Stage::Field, Severity::Warning, false),
            finding(Stage::Field, Severity::Error, true),
            finding(Stage::Aggregation, Severity::Warning, true),
        ];

        let summary = FindingSummary::from_findings(&findings);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.warnings, 2);
        assert_eq!(summary.unresolved_errors, 1);
        assert_eq!(summary.unresolved_warnings, 1);
        assert_eq!(summary.by_stage.field, 2);
        assert!(summary.has_structure_errors);
        assert!(!summary.has_sequence_errors);
    }

    #[test]
    fn test_stage_round_trip_names() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>(), Ok(stage));
        }
        assert!("schema".parse::<Stage>().is_err());
    }
}
