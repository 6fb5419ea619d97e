//! # Scorecard Common Library
//!
//! Shared code for the scorecard services:
//! - Error type
//! - Configuration loading and root folder resolution
//! - Database initialization and schema
//! - Timestamp helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
