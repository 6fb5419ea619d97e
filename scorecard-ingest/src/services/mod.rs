//! Pipeline services
//!
//! - `duplicate_detector`: normalized content hash and original lookup
//! - `submission_service`: the ingestion pipeline and submission operations
//! - `scorecard`: per-supplier metrics and rollup refresh
//! - `drop_folder`: submission of files dropped into supplier directories

pub mod drop_folder;
pub mod duplicate_detector;
pub mod scorecard;
pub mod submission_service;

pub use drop_folder::{DropFolder, ScanReport};
pub use duplicate_detector::{content_hash, DetectionMethod, DuplicateDetector, DuplicateError};
pub use scorecard::{compute_scorecard, refresh_all, refresh_supplier_rollup};
pub use submission_service::{validate_supplier_id, SubmissionService, SubmitReceipt, SubmitRequest};
