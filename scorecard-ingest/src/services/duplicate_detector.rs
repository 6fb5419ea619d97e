//! Duplicate submission detection
//!
//! Computes a SHA-256 over normalized document bytes and looks for a live
//! (non-failed) submission of the same supplier with the same instance
//! identifier or, failing that, the same hash.
//!
//! This lookup is only a fast path. The unique indexes on `submissions`
//! are what actually prevent two concurrent uploads from both landing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{parse_column, parse_stored_timestamp, parse_uuid};
use crate::error::PipelineResult;
use crate::models::SubmissionStatus;

/// Which key matched the earlier submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    InstanceIdentifier,
    ContentHash,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DetectionMethod::InstanceIdentifier => "instance_identifier",
            DetectionMethod::ContentHash => "content_hash",
        })
    }
}

/// The document was already submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error(
    "Duplicate of submission {original_submission_id} ('{original_file_name}', {original_status}) detected by {detection}"
)]
pub struct DuplicateError {
    pub original_submission_id: Uuid,
    pub original_file_name: String,
    pub original_submitted_at: DateTime<Utc>,
    pub original_status: SubmissionStatus,
    pub detection: DetectionMethod,
}

/// SHA-256 (hex) of the document after normalization
///
/// UTF-8 BOM dropped, CRLF and lone CR turned into LF, leading and trailing
/// whitespace trimmed, so line-ending or editor noise does not defeat dedup.
pub fn content_hash(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let start = bytes.iter().position(|b| !b.is_ascii_whitespace());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace());
    let trimmed = match (start, end) {
        (Some(start), Some(end)) => &bytes[start..=end],
        _ => &[][..],
    };

    let mut normalized = Vec::with_capacity(trimmed.len());
    let mut iter = trimmed.iter().peekable();
    while let Some(&b) = iter.next() {
        if b == b'\r' {
            normalized.push(b'\n');
            if iter.peek() == Some(&&b'\n') {
                iter.next();
            }
        } else {
            normalized.push(b);
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(&normalized);
    format!("{:x}", hasher.finalize())
}

/// Store-backed duplicate lookup
pub struct DuplicateDetector {
    db: SqlitePool,
}

impl DuplicateDetector {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Instance identifier first, then content hash
    pub async fn find_original(
        &self,
        supplier_id: &str,
        content_hash: &str,
        instance_identifier: Option<&str>,
    ) -> PipelineResult<Option<DuplicateError>> {
        if let Some(instance) = instance_identifier {
            if let Some(dup) = self
                .lookup(supplier_id, "instance_identifier", instance, DetectionMethod::InstanceIdentifier)
                .await?
            {
                return Ok(Some(dup));
            }
        }

        self.lookup(supplier_id, "content_hash", content_hash, DetectionMethod::ContentHash)
            .await
    }

    async fn lookup(
        &self,
        supplier_id: &str,
        column: &'static str,
        value: &str,
        detection: DetectionMethod,
    ) -> PipelineResult<Option<DuplicateError>> {
        let sql = format!(
            "SELECT id, file_name, submitted_at, status FROM submissions
             WHERE supplier_id = ? AND {} = ? AND status != 'failed'
             ORDER BY submitted_at LIMIT 1",
            column
        );

        let row: Option<(String, String, String, String)> = sqlx::query_as(&sql)
            .bind(supplier_id)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;

        let Some((id, file_name, submitted_at, status)) = row else {
            return Ok(None);
        };

        let dup = DuplicateError {
            original_submission_id: parse_uuid(&id)?,
            original_file_name: file_name,
            original_submitted_at: parse_stored_timestamp(&submitted_at)?,
            original_status: parse_column("status", &status)?,
            detection,
        };

        tracing::info!(
            supplier_id,
            original = %dup.original_submission_id,
            detection = %detection,
            "Duplicate submission detected"
        );

        Ok(Some(dup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_endings_and_bom_do_not_change_hash() {
        let unix = content_hash(b"<a>\n<b/>\n</a>");
        assert_eq!(unix, content_hash(b"<a>\r\n<b/>\r\n</a>"));
        assert_eq!(unix, content_hash(b"<a>\r<b/>\r</a>"));
        assert_eq!(unix, content_hash(b"\xEF\xBB\xBF<a>\n<b/>\n</a>\n\n"));
        assert_eq!(unix, content_hash(b"  \n<a>\n<b/>\n</a>  "));
    }

    #[test]
    fn test_content_change_changes_hash() {
        assert_ne!(content_hash(b"<a>1</a>"), content_hash(b"<a>2</a>"));
        assert_ne!(content_hash(b"<a> 1</a>"), content_hash(b"<a>1</a>"));
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = content_hash(b"");
        assert_eq!(hash, "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
    }

    #[test]
    fn test_duplicate_error_serializes_snake_case() {
        let dup = DuplicateError {
            original_submission_id: Uuid::nil(),
            original_file_name: "a.xml".to_string(),
            original_submitted_at: Utc::now(),
            original_status: SubmissionStatus::Validated,
            detection: DetectionMethod::InstanceIdentifier,
        };
        let value = serde_json::to_value(&dup).unwrap();
        assert_eq!(value["detection"], "instance_identifier");
        assert_eq!(value["original_status"], "validated");
    }
}
