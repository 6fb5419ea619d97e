//! Common error types for the scorecard services

use thiserror::Error;

/// Common result type for scorecard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the scorecard crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error (corrupt row, serialization failure, ...)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the underlying failure is SQLite lock contention
    ///
    /// Lock errors mean the statement (or transaction) never took effect,
    /// so the caller may safely run it again.
    pub fn is_database_locked(&self) -> bool {
        match self {
            #[cfg(feature = "sqlx")]
            Error::Database(db_err) => {
                let text = db_err.to_string();
                text.contains("database is locked") || text.contains("database table is locked")
            }
            _ => false,
        }
    }
}
