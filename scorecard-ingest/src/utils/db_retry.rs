//! Database Retry Logic
//!
//! Exponential backoff for transient SQLite lock errors. The retried unit is
//! always a whole transaction that never committed, so re-running it cannot
//! duplicate data.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::PipelineError;

/// Errors that can report SQLite lock contention
pub trait LockContention {
    fn is_database_locked(&self) -> bool;
}

impl LockContention for PipelineError {
    fn is_database_locked(&self) -> bool {
        PipelineError::is_database_locked(self)
    }
}

impl LockContention for scorecard_common::Error {
    fn is_database_locked(&self) -> bool {
        scorecard_common::Error::is_database_locked(self)
    }
}

/// Retry a database operation with exponential backoff until max_wait_ms elapses.
///
/// **Algorithm:**
/// 1. Attempt operation
/// 2. If "database is locked" and less than `max_wait_ms` has elapsed: log WARN, back off, retry
/// 3. Lock error after `max_wait_ms`: log ERROR, return the last error
/// 4. Any other error: return immediately
///
/// Backoff starts at 10ms and doubles up to 1000ms.
pub async fn retry_on_lock<F, Fut, T, E>(operation_name: &str, max_wait_ms: u64, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: LockContention + std::fmt::Display,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = 10u64;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying database operation");
        }

        match operation().await {
            Ok(result) => {
                let elapsed_ms = start_time.elapsed().as_millis();

                if attempt > 1 {
                    if elapsed_ms > 5000 {
                        tracing::error!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms,
                            "Database operation succeeded after EXTENDED retry period (>5s) - indicates severe contention"
                        );
                    } else if elapsed_ms > 2000 {
                        tracing::warn!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms,
                            "Database operation succeeded after significant retry period (>2s)"
                        );
                    } else {
                        tracing::debug!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms,
                            "Database operation succeeded after retry"
                        );
                    }
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_database_locked() {
                    return Err(err);
                }

                let elapsed = start_time.elapsed();

                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis(),
                        max_wait_ms,
                        error = %err,
                        "Database operation failed: max retry time exceeded"
                    );
                    return Err(err);
                }

                let next_backoff_ms = backoff_ms.min(1000);

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    elapsed_ms = elapsed.as_millis(),
                    backoff_ms = next_backoff_ms,
                    remaining_ms = max_duration.saturating_sub(elapsed).as_millis(),
                    "Database locked, will retry after backoff"
                );

                tokio::time::sleep(Duration::from_millis(next_backoff_ms)).await;

                backoff_ms = (backoff_ms * 2).min(1000);
            }
        }
    }
}
