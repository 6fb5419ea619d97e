//! Submission state machine
//!
//! received → processing → validated | failed | held, and held → reprocessed
//! once a corrected resubmission validates. No other transition is legal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::{EpcisEvent, Finding, FindingSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Received,
    Processing,
    Validated,
    Failed,
    Held,
    Reprocessed,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 6] = [
        SubmissionStatus::Received,
        SubmissionStatus::Processing,
        SubmissionStatus::Validated,
        SubmissionStatus::Failed,
        SubmissionStatus::Held,
        SubmissionStatus::Reprocessed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Received => "received",
            SubmissionStatus::Processing => "processing",
            SubmissionStatus::Validated => "validated",
            SubmissionStatus::Failed => "failed",
            SubmissionStatus::Held => "held",
            SubmissionStatus::Reprocessed => "reprocessed",
        }
    }

    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, next),
            (Received, Processing)
                | (Processing, Validated)
                | (Processing, Failed)
                | (Processing, Held)
                | (Held, Reprocessed)
        )
    }

    /// Document carried no error findings
    pub fn is_valid(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::Validated | SubmissionStatus::Held | SubmissionStatus::Reprocessed
        )
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubmissionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown submission status '{}'", s))
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Xml,
    Json,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Xml => "xml",
            ContentType::Json => "json",
        }
    }

    /// Guess from a MIME type (`application/xml`, `application/ld+json`, ...)
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if essence.ends_with("/xml") || essence.ends_with("+xml") {
            Some(ContentType::Xml)
        } else if essence.ends_with("/json") || essence.ends_with("+json") {
            Some(ContentType::Json)
        } else {
            None
        }
    }

    /// Guess from a file name extension
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = std::path::Path::new(name)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        match ext.as_str() {
            "xml" => Some(ContentType::Xml),
            "json" | "jsonld" => Some(ContentType::Json),
            _ => None,
        }
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xml" => Ok(ContentType::Xml),
            "json" => Ok(ContentType::Json),
            other => Err(format!("unsupported content type '{}'", other)),
        }
    }
}

/// One uploaded document with its parsed events and findings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub supplier_id: String,
    pub file_name: String,
    pub content_type: ContentType,
    pub file_size: i64,
    /// SHA-256 hex of the normalized bytes
    pub content_hash: String,
    pub instance_identifier: Option<String>,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub supersedes: Option<Uuid>,
    pub superseded_by: Option<Uuid>,
    /// Unresolved error findings (computed at query time)
    pub error_count: i64,
    /// Unresolved warning findings (computed at query time)
    pub warning_count: i64,
    pub events: Vec<EpcisEvent>,
    pub findings: Vec<Finding>,
}

impl Submission {
    pub fn new(
        supplier_id: String,
        file_name: String,
        content_type: ContentType,
        file_size: usize,
        content_hash: String,
        instance_identifier: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            supplier_id,
            file_name,
            content_type,
            file_size: file_size as i64,
            content_hash,
            instance_identifier,
            status: SubmissionStatus::Received,
            submitted_at: Utc::now(),
            processing_started_at: None,
            completed_at: None,
            supersedes: None,
            superseded_by: None,
            error_count: 0,
            warning_count: 0,
            events: Vec::new(),
            findings: Vec::new(),
        }
    }

    /// Move to `next`, stamping processing/completion times
    pub fn transition_to(&mut self, next: SubmissionStatus) -> Result<(), PipelineError> {
        if !self.status.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        match next {
            SubmissionStatus::Processing => self.processing_started_at = Some(now),
            SubmissionStatus::Validated | SubmissionStatus::Failed | SubmissionStatus::Held => {
                self.completed_at = Some(now)
            }
            _ => {}
        }
        self.status = next;
        Ok(())
    }

    /// Recompute unresolved counts from the attached findings
    pub fn refresh_counts(&mut self) {
        let summary = self.summary();
        self.error_count = summary.unresolved_errors as i64;
        self.warning_count = summary.unresolved_warnings as i64;
    }

    pub fn summary(&self) -> FindingSummary {
        FindingSummary::from_findings(&self.findings)
    }
}

/// List row: submission without events/findings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub id: Uuid,
    pub supplier_id: String,
    pub file_name: String,
    pub content_type: ContentType,
    pub file_size: i64,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub supersedes: Option<Uuid>,
    pub superseded_by: Option<Uuid>,
    pub error_count: i64,
    pub warning_count: i64,
}
