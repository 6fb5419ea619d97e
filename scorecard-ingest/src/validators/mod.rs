//! Validation rule engine
//!
//! Four stages run in a fixed order over one shared findings accumulator:
//! structure → field → sequence → aggregation. If the parser could not
//! extract a single event only the structure stage runs; otherwise every
//! stage sees whatever did parse.

pub mod aggregation;
pub mod field;
pub mod identifiers;
pub mod sequence;
pub mod structure;
pub mod vocabulary;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::{NewFinding, Severity, Stage, SubmissionStatus};
use crate::parser::ParsedDocument;

/// When a document without errors is held for review instead of validated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldPolicy {
    /// Any warning holds the document
    #[default]
    AnyWarning,
    /// Only unresolved open aggregations hold the document
    OpenAggregation,
}

impl HoldPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldPolicy::AnyWarning => "any_warning",
            HoldPolicy::OpenAggregation => "open_aggregation",
        }
    }
}

impl FromStr for HoldPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "any_warning" => Ok(HoldPolicy::AnyWarning),
            "open_aggregation" => Ok(HoldPolicy::OpenAggregation),
            other => Err(format!(
                "unknown hold policy '{}' (expected any_warning or open_aggregation)",
                other
            )),
        }
    }
}

impl fmt::Display for HoldPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a disposition outside the business step's allowed set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispositionRule {
    #[default]
    Error,
    Warning,
    Off,
}

impl DispositionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispositionRule::Error => "error",
            DispositionRule::Warning => "warning",
            DispositionRule::Off => "off",
        }
    }
}

impl FromStr for DispositionRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "error" => Ok(DispositionRule::Error),
            "warning" => Ok(DispositionRule::Warning),
            "off" => Ok(DispositionRule::Off),
            other => Err(format!(
                "unknown disposition rule '{}' (expected error, warning or off)",
                other
            )),
        }
    }
}

impl fmt::Display for DispositionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables that change validation outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub hold_policy: HoldPolicy,
    pub disposition_rule: DispositionRule,
    /// Packs younger than this (relative to the document's latest event)
    /// are in flight, not abandoned. `None` flags every open pack.
    pub aggregation_open_window: Option<Duration>,
}

/// Findings accumulator shared by the stages
#[derive(Debug, Default)]
pub struct FindingSink {
    findings: Vec<NewFinding>,
}

impl FindingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: NewFinding) {
        self.findings.push(finding);
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = NewFinding>) {
        self.findings.extend(findings);
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    pub fn has(&self, stage: Stage, severity: Severity) -> bool {
        self.findings
            .iter()
            .any(|f| f.stage == stage && f.severity == severity)
    }

    pub fn into_findings(self) -> Vec<NewFinding> {
        self.findings
    }
}

type StageFn = fn(&ParsedDocument, &ValidationPolicy, &mut FindingSink);

const STAGES: [(Stage, StageFn); 4] = [
    (Stage::Structure, structure::check),
    (Stage::Field, field::check),
    (Stage::Sequence, sequence::check),
    (Stage::Aggregation, aggregation::check),
];

/// Findings plus the status they imply
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub findings: Vec<NewFinding>,
    pub status: SubmissionStatus,
}

impl ValidationOutcome {
    pub fn error_count(&self) -> usize {
        self.findings.iter().filter(|f| f.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.findings.len() - self.error_count()
    }
}

/// Run every applicable stage and grade the document
pub fn validate(doc: &ParsedDocument, policy: &ValidationPolicy) -> ValidationOutcome {
    let mut sink = FindingSink::new();
    sink.extend(doc.findings.iter().cloned());

    for (stage, run) in STAGES {
        if stage != Stage::Structure && doc.events.is_empty() {
            tracing::debug!(stage = stage.as_str(), "No events extracted, skipping stage");
            continue;
        }
        run(doc, policy, &mut sink);
    }

    let status = if sink.count(Severity::Error) > 0 {
        SubmissionStatus::Failed
    } else {
        let hold = match policy.hold_policy {
            HoldPolicy::AnyWarning => sink.count(Severity::Warning) > 0,
            HoldPolicy::OpenAggregation => sink.has(Stage::Aggregation, Severity::Warning),
        };
        if hold {
            SubmissionStatus::Held
        } else {
            SubmissionStatus::Validated
        }
    };

    ValidationOutcome {
        findings: sink.into_findings(),
        status,
    }
}

/// Stable sort by event index (document order), document-level findings last
pub(crate) fn sort_by_event(findings: &mut [NewFinding]) {
    findings.sort_by_key(|f| f.event_index.unwrap_or(usize::MAX));
}
