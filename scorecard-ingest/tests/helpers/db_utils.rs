//! Database Test Utilities

use anyhow::Result;
use scorecard_ingest::config::PipelineConfig;
use scorecard_ingest::services::SubmissionService;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

/// File-backed database with the full schema
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_scorecard.db");
    let pool = scorecard_common::db::init_database(&db_path).await?;
    Ok((temp_dir, pool))
}

/// In-memory database on a single connection
///
/// Every pooled connection to `sqlite::memory:` would get its own empty
/// database, so the pool is capped at one.
pub async fn create_memory_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    scorecard_common::db::create_schema(&pool)
        .await
        .expect("Failed to create schema");
    pool
}

/// Defaults with the background rollup switched off
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        rollup_interval_secs: 0,
        ..Default::default()
    }
}

pub fn test_service(pool: &SqlitePool) -> SubmissionService {
    SubmissionService::new(pool.clone(), Arc::new(test_config()))
}
