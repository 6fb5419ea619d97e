//! Timestamp utilities
//!
//! All persisted timestamps are RFC 3339 UTC strings with millisecond
//! precision and a `Z` suffix, so lexical order equals chronological order
//! and SQL range filters can compare the text directly.

use chrono::{DateTime, Datelike, Duration, NaiveDate, SecondsFormat, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored (or user supplied) RFC 3339 timestamp into UTC
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("Invalid timestamp '{}': {}", text, e)))
}

/// Monday of the ISO week containing `ts`
pub fn week_start(ts: &DateTime<Utc>) -> NaiveDate {
    let date = ts.date_naive();
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Midnight UTC at the start of `date`
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH)
}
