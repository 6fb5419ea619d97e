//! Submission record store
//!
//! Runtime sqlx queries over the schema created by
//! `scorecard_common::db::init_database`. Row-decoding helpers live here so
//! every table module reports corrupt columns the same way.

pub mod findings;
pub mod settings;
pub mod submissions;
pub mod suppliers;
pub mod trends;

use chrono::{DateTime, Utc};
use scorecard_common::time::parse_timestamp;
use scorecard_common::{Error, Result};
use std::str::FromStr;
use uuid::Uuid;

pub(crate) fn parse_uuid(text: &str) -> Result<Uuid> {
    Uuid::parse_str(text).map_err(|e| Error::Internal(format!("Corrupt UUID '{}': {}", text, e)))
}

pub(crate) fn parse_optional_uuid(text: Option<String>) -> Result<Option<Uuid>> {
    text.as_deref().map(parse_uuid).transpose()
}

/// Stored timestamps are always written by us, so a bad one is corruption
pub(crate) fn parse_stored_timestamp(text: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(text).map_err(|e| Error::Internal(e.to_string()))
}

pub(crate) fn parse_optional_timestamp(text: Option<String>) -> Result<Option<DateTime<Utc>>> {
    text.as_deref().map(parse_stored_timestamp).transpose()
}

/// Decode an enum column stored via its `as_str()` name
pub(crate) fn parse_column<T>(column: &str, text: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    text.parse()
        .map_err(|e: String| Error::Internal(format!("Corrupt {} column: {}", column, e)))
}

/// SQLite UNIQUE constraint violation
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}
