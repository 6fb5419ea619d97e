//! Submission pipeline
//!
//! receive → parse → deduplicate → validate → persist, then the read and
//! resolution operations over stored submissions.
//!
//! Parsing, hashing and validation are CPU-bound and run together on the
//! blocking pool with no await points in between. The only write is the
//! single `create_submission` transaction at the end, so a request that is
//! dropped early leaves nothing behind.

use chrono::Utc;
use scorecard_common::Error;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::db;
use crate::db::submissions::{StoredDocument, SubmissionFilter};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{ContentType, Finding, Submission, SubmissionStatus, SubmissionSummary};
use crate::pagination::Page;
use crate::parser::{parse_document, ParsedDocument};
use crate::services::duplicate_detector::{content_hash, DuplicateDetector};
use crate::utils::retry_on_lock;
use crate::validators::{validate, ValidationOutcome};

/// Longest accepted supplier identifier
const MAX_SUPPLIER_ID_LEN: usize = 64;

/// One upload as received by the boundary
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub supplier_id: String,
    pub file_name: String,
    pub content_type: ContentType,
    /// Held submission this upload corrects
    pub supersedes: Option<Uuid>,
    pub content: Vec<u8>,
}

/// Result of a successful submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub submission_id: Uuid,
    pub status: SubmissionStatus,
    pub error_count: i64,
    pub warning_count: i64,
}

/// Supplier ids are path segments and log fields: keep them plain
pub fn validate_supplier_id(supplier_id: &str) -> PipelineResult<()> {
    let valid = !supplier_id.is_empty()
        && supplier_id.len() <= MAX_SUPPLIER_ID_LEN
        && supplier_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if valid {
        Ok(())
    } else {
        Err(PipelineError::InvalidInput(format!(
            "Invalid supplier id '{}': use 1-{} characters from A-Z a-z 0-9 . _ -",
            supplier_id, MAX_SUPPLIER_ID_LEN
        )))
    }
}

#[derive(Clone)]
pub struct SubmissionService {
    db: SqlitePool,
    config: Arc<PipelineConfig>,
}

impl SubmissionService {
    pub fn new(db: SqlitePool, config: Arc<PipelineConfig>) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one document through the pipeline and store the result
    ///
    /// Validation findings are data, not errors: a document full of problems
    /// still returns `Ok` with status `failed`. Errors are reserved for
    /// duplicates, bad requests and store failures.
    pub async fn submit(&self, request: SubmitRequest) -> PipelineResult<SubmitReceipt> {
        let SubmitRequest {
            supplier_id,
            file_name,
            content_type,
            supersedes,
            content,
        } = request;

        validate_supplier_id(&supplier_id)?;

        let file_name = file_name.trim().to_string();
        if file_name.is_empty() {
            return Err(PipelineError::InvalidInput("file_name must not be empty".to_string()));
        }

        if content.len() > self.config.max_upload_bytes {
            return Err(PipelineError::PayloadTooLarge {
                size: content.len(),
                limit: self.config.max_upload_bytes,
            });
        }

        let mut submission = Submission::new(
            supplier_id,
            file_name,
            content_type,
            content.len(),
            String::new(),
            None,
        );
        submission.supersedes = supersedes;
        submission.transition_to(SubmissionStatus::Processing)?;

        tracing::info!(
            submission_id = %submission.id,
            supplier_id = %submission.supplier_id,
            file_name = %submission.file_name,
            content_type = content_type.as_str(),
            size = content.len(),
            "Processing submission"
        );

        let policy = self.config.validation_policy();
        let (content, hash, doc, outcome) = tokio::task::spawn_blocking(move || {
            let hash = content_hash(&content);
            let doc = parse_document(&content, content_type);
            let outcome = validate(&doc, &policy);
            (content, hash, doc, outcome)
        })
        .await
        .map_err(|e| Error::Internal(format!("Validation task failed: {}", e)))?;

        let detector = DuplicateDetector::new(self.db.clone());
        if let Some(dup) = detector
            .find_original(&submission.supplier_id, &hash, doc.instance_identifier.as_deref())
            .await?
        {
            return Err(dup.into());
        }

        submission.content_hash = hash;
        complete(&mut submission, doc, outcome)?;

        retry_on_lock("create submission", self.config.max_lock_wait_ms, || {
            db::submissions::create_submission(&self.db, &submission, &content)
        })
        .await?;

        tracing::info!(
            submission_id = %submission.id,
            supplier_id = %submission.supplier_id,
            status = %submission.status,
            events = submission.events.len(),
            errors = submission.error_count,
            warnings = submission.warning_count,
            "Submission processed"
        );

        Ok(SubmitReceipt {
            submission_id: submission.id,
            status: submission.status,
            error_count: submission.error_count,
            warning_count: submission.warning_count,
        })
    }

    pub async fn get_submission(&self, id: Uuid) -> PipelineResult<Submission> {
        db::submissions::get_submission(&self.db, id).await
    }

    pub async fn get_document(&self, id: Uuid) -> PipelineResult<StoredDocument> {
        db::submissions::get_document(&self.db, id).await
    }

    pub async fn list_submissions(
        &self,
        filter: &SubmissionFilter,
        page: i64,
        page_size: Option<i64>,
    ) -> PipelineResult<Page<SubmissionSummary>> {
        db::submissions::list_submissions(&self.db, filter, page, page_size).await
    }

    /// Resolve a finding and return its submission with fresh counts
    pub async fn resolve_finding(
        &self,
        finding_id: Uuid,
        note: &str,
        resolved_by: &str,
    ) -> PipelineResult<Submission> {
        let note = note.trim();
        let resolved_by = resolved_by.trim();
        if note.is_empty() {
            return Err(PipelineError::InvalidInput("Resolution note must not be empty".to_string()));
        }
        if resolved_by.is_empty() {
            return Err(PipelineError::InvalidInput("resolved_by must not be empty".to_string()));
        }

        let resolved_at = Utc::now();
        let submission_id = retry_on_lock("resolve finding", self.config.max_lock_wait_ms, || {
            db::findings::append_resolution(&self.db, finding_id, note, resolved_by, resolved_at)
        })
        .await?;

        tracing::info!(
            finding_id = %finding_id,
            submission_id = %submission_id,
            resolved_by,
            "Finding resolved"
        );

        self.get_submission(submission_id).await
    }

    /// Explicit `held → reprocessed`; returns the old submission
    pub async fn mark_reprocessed(&self, old_id: Uuid, new_id: Uuid) -> PipelineResult<Submission> {
        retry_on_lock("mark reprocessed", self.config.max_lock_wait_ms, || {
            db::submissions::mark_reprocessed(&self.db, old_id, new_id)
        })
        .await?;

        self.get_submission(old_id).await
    }
}

/// Attach parse/validation results and move to the final status
fn complete(submission: &mut Submission, doc: ParsedDocument, outcome: ValidationOutcome) -> PipelineResult<()> {
    let created_at = Utc::now();
    submission.instance_identifier = doc.instance_identifier;
    submission.events = doc.events;
    submission.findings = outcome
        .findings
        .into_iter()
        .enumerate()
        .map(|(seq, finding)| Finding::from_new(submission.id, seq as u32, finding, created_at))
        .collect();

    submission.transition_to(outcome.status)?;
    submission.refresh_counts();
    Ok(())
}
