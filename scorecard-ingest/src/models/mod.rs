//! Data models for the ingestion pipeline

pub mod event;
pub mod finding;
pub mod scorecard;
pub mod submission;
pub mod supplier;

pub use event::{cbv_term, Action, CbvVocabulary, EpcRef, EpcisEvent, EventKind, Ilmd, TypedValue};
pub use finding::{Finding, FindingSummary, NewFinding, Severity, Stage, StageCounts};
pub use scorecard::{
    FindingTotals, ScorecardReport, StageBreakdown, StageTotals, SubmissionCounts, WeeklyBucket,
};
pub use submission::{ContentType, Submission, SubmissionStatus, SubmissionSummary};
pub use supplier::{Supplier, SupplierRollup};
