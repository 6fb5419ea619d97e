//! Utility modules for scorecard-ingest

pub mod db_retry;

pub use db_retry::{retry_on_lock, LockContention};
