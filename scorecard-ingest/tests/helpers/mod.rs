//! Test Helper Utilities
//!
//! Shared databases, services and EPCIS documents for the integration tests

#![allow(dead_code)]

pub mod db_utils;
pub mod fixtures;

pub use db_utils::{create_memory_db, create_test_db, test_config, test_service};
