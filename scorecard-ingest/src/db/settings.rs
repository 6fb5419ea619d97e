//! Settings table access
//!
//! Key/value rows; a missing row or NULL value means "not configured here".

use scorecard_common::{Error, Result};
use sqlx::{Pool, Sqlite};

pub const HOLD_POLICY: &str = "hold_policy";
pub const AGGREGATION_OPEN_WINDOW_HOURS: &str = "aggregation_open_window_hours";
pub const MAX_UPLOAD_BYTES: &str = "max_upload_bytes";
pub const SCORECARD_WINDOW_DAYS: &str = "scorecard_window_days";
pub const ROLLUP_INTERVAL_SECS: &str = "rollup_interval_secs";
pub const MAX_LOCK_WAIT_MS: &str = "max_lock_wait_ms";
pub const DISPOSITION_RULE: &str = "disposition_rule";
pub const DROP_FOLDER_POLL_SECS: &str = "drop_folder_poll_secs";

/// Generic setting getter
pub async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row.and_then(|(value,)| value) {
        Some(value) => {
            let parsed = value
                .trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Setting '{}' = '{}': {}", key, value, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter
pub async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}
