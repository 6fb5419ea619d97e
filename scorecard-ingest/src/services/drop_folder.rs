//! Supplier drop folders
//!
//! Documents placed in `<inbox>/<supplier_id>/` are submitted exactly as an
//! HTTP upload would be. A submitted file moves to the supplier's
//! `archived/` directory. Files the pipeline refuses for good (duplicates,
//! bad supplier directory names, oversized documents) move to `rejected/`.
//! Store failures leave the file where it is for the next pass.

use chrono::Utc;
use scorecard_common::Error;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use super::submission_service::{SubmissionService, SubmitRequest};
use crate::error::{PipelineError, PipelineResult};
use crate::models::ContentType;

pub const ARCHIVED_DIR: &str = "archived";
pub const REJECTED_DIR: &str = "rejected";

/// Files modified more recently than this may still be mid-copy
pub const DEFAULT_SETTLE_TIME: Duration = Duration::from_secs(1);

/// Outcome counts of one pass over the inbox
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub submitted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    /// Left in place after a transient failure
    pub deferred: usize,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        *self == ScanReport::default()
    }
}

/// A document waiting in a supplier directory
#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    supplier_id: String,
    file_name: String,
    content_type: ContentType,
}

#[derive(Clone)]
pub struct DropFolder {
    inbox: PathBuf,
    service: SubmissionService,
    settle_time: Duration,
}

impl DropFolder {
    pub fn new(inbox: PathBuf, service: SubmissionService) -> Self {
        Self {
            inbox,
            service,
            settle_time: DEFAULT_SETTLE_TIME,
        }
    }

    pub fn with_settle_time(mut self, settle_time: Duration) -> Self {
        self.settle_time = settle_time;
        self
    }

    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    /// Submit every settled document currently in the inbox
    pub async fn scan_once(&self) -> PipelineResult<ScanReport> {
        tokio::fs::create_dir_all(&self.inbox).await.map_err(Error::Io)?;

        let inbox = self.inbox.clone();
        let settle_time = self.settle_time;
        let candidates = tokio::task::spawn_blocking(move || find_candidates(&inbox, settle_time))
            .await
            .map_err(|e| Error::Internal(format!("Drop folder scan failed: {}", e)))?;

        let mut report = ScanReport::default();
        for candidate in candidates {
            self.ingest(candidate, &mut report).await;
        }

        if !report.is_empty() {
            info!(
                inbox = %self.inbox.display(),
                submitted = report.submitted,
                duplicates = report.duplicates,
                rejected = report.rejected,
                deferred = report.deferred,
                "Drop folder scan complete"
            );
        }

        Ok(report)
    }

    async fn ingest(&self, candidate: Candidate, report: &mut ScanReport) {
        let content = match tokio::fs::read(&candidate.path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %candidate.path.display(), error = %e, "Cannot read dropped file");
                report.deferred += 1;
                return;
            }
        };

        let request = SubmitRequest {
            supplier_id: candidate.supplier_id.clone(),
            file_name: candidate.file_name.clone(),
            content_type: candidate.content_type,
            supersedes: None,
            content,
        };

        let destination = match self.service.submit(request).await {
            Ok(receipt) => {
                info!(
                    path = %candidate.path.display(),
                    submission_id = %receipt.submission_id,
                    status = %receipt.status,
                    "Dropped file submitted"
                );
                report.submitted += 1;
                ARCHIVED_DIR
            }
            Err(PipelineError::Duplicate(dup)) => {
                warn!(path = %candidate.path.display(), "{}", dup);
                report.duplicates += 1;
                REJECTED_DIR
            }
            Err(e @ (PipelineError::InvalidInput(_) | PipelineError::PayloadTooLarge { .. })) => {
                warn!(path = %candidate.path.display(), error = %e, "Dropped file rejected");
                report.rejected += 1;
                REJECTED_DIR
            }
            Err(e) => {
                warn!(
                    path = %candidate.path.display(),
                    error = %e,
                    "Dropped file left for the next pass"
                );
                report.deferred += 1;
                return;
            }
        };

        match move_into(&candidate.path, destination).await {
            Ok(moved) => debug!(to = %moved.display(), "Dropped file moved"),
            // A submitted file left behind comes back as a duplicate next pass
            Err(e) => warn!(
                path = %candidate.path.display(),
                error = %e,
                "Failed to move dropped file into {}/",
                destination
            ),
        }
    }
}

/// Settled EPCIS files exactly one level below the inbox, in name order
fn find_candidates(inbox: &Path, settle_time: Duration) -> Vec<Candidate> {
    let now = SystemTime::now();
    let mut candidates = Vec::new();

    let walker = WalkDir::new(inbox)
        .min_depth(2)
        .max_depth(2)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error accessing drop folder entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %entry.path().display(), "Skipping file with a non UTF-8 name");
            continue;
        };
        let Some(content_type) = ContentType::from_file_name(&file_name) else {
            continue;
        };
        let Some(supplier_id) = entry
            .path()
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .map(str::to_string)
        else {
            continue;
        };

        let settled = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            // Clock skew can put mtime slightly ahead of now
            .map(|modified| now.duration_since(modified).unwrap_or(Duration::ZERO))
            .is_some_and(|age| age >= settle_time);
        if !settled {
            debug!(path = %entry.path().display(), "Dropped file not settled yet");
            continue;
        }

        candidates.push(Candidate {
            path: entry.path().to_path_buf(),
            supplier_id,
            file_name,
            content_type,
        });
    }

    candidates
}

/// Dot-named entries below the inbox; the inbox itself may be anywhere
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Move `path` into `<its directory>/<dir_name>/`, never overwriting
async fn move_into(path: &Path, dir_name: &str) -> std::io::Result<PathBuf> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().unwrap_or_default().to_string_lossy().into_owned();

    let target_dir = parent.join(dir_name);
    tokio::fs::create_dir_all(&target_dir).await?;

    let mut target = target_dir.join(&file_name);
    if tokio::fs::try_exists(&target).await? {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3f");
        target = target_dir.join(format!("{}-{}", stamp, file_name));
    }

    tokio::fs::rename(path, &target).await?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_candidates_only_in_supplier_directories() {
        let dir = TempDir::new().unwrap();
        let inbox = dir.path();
        std::fs::create_dir_all(inbox.join("acme/archived")).unwrap();
        std::fs::create_dir_all(inbox.join(".staging")).unwrap();

        std::fs::write(inbox.join("loose.xml"), "<x/>").unwrap();
        std::fs::write(inbox.join("acme/b.json"), "{}").unwrap();
        std::fs::write(inbox.join("acme/a.xml"), "<x/>").unwrap();
        std::fs::write(inbox.join("acme/notes.txt"), "hi").unwrap();
        std::fs::write(inbox.join("acme/archived/old.xml"), "<x/>").unwrap();
        std::fs::write(inbox.join(".staging/c.xml"), "<x/>").unwrap();

        let found = find_candidates(inbox, Duration::ZERO);
        let names: Vec<&str> = found.iter().map(|c| c.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.xml", "b.json"]);
        assert!(found.iter().all(|c| c.supplier_id == "acme"));
        assert_eq!(found[1].content_type, ContentType::Json);
    }

    #[test]
    fn test_hidden_inbox_root_is_still_walked() {
        let dir = TempDir::new().unwrap();
        let inbox = dir.path().join(".inbox");
        std::fs::create_dir_all(inbox.join("acme")).unwrap();
        std::fs::write(inbox.join("acme/a.xml"), "<x/>").unwrap();

        assert_eq!(find_candidates(&inbox, Duration::ZERO).len(), 1);
    }

    #[test]
    fn test_unsettled_files_wait() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("acme")).unwrap();
        std::fs::write(dir.path().join("acme/a.xml"), "<x/>").unwrap();

        assert!(find_candidates(dir.path(), Duration::from_secs(3600)).is_empty());
        assert_eq!(find_candidates(dir.path(), Duration::ZERO).len(), 1);
    }

    #[tokio::test]
    async fn test_move_into_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.xml");

        std::fs::write(&first, "one").unwrap();
        let moved_one = move_into(&first, ARCHIVED_DIR).await.unwrap();
        std::fs::write(&first, "two").unwrap();
        let moved_two = move_into(&first, ARCHIVED_DIR).await.unwrap();

        assert_eq!(moved_one, dir.path().join("archived/a.xml"));
        assert_ne!(moved_one, moved_two);
        assert_eq!(std::fs::read_to_string(moved_one).unwrap(), "one");
        assert_eq!(std::fs::read_to_string(moved_two).unwrap(), "two");
        assert!(!first.exists());
    }
}
