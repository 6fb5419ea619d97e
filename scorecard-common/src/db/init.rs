//! Database initialization
//!
//! Opens (creating when missing) the SQLite database and creates every table
//! idempotently. Connection-level pragmas are set through the connect options
//! so that every pooled connection gets them, not just the first one.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// SQLite busy timeout applied to every connection
///
/// Kept short so writers surface "database is locked" quickly and the
/// caller's retry loop (with its own upper bound) takes over.
pub const BUSY_TIMEOUT_MS: u64 = 250;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_suppliers_table(pool).await?;
    create_submissions_table(pool).await?;
    create_submission_events_table(pool).await?;
    create_submission_documents_table(pool).await?;
    create_findings_table(pool).await?;
    create_weekly_trends_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Key/value runtime settings
///
/// A NULL or missing value means "not set here", letting the next
/// configuration source decide.
async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_suppliers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS suppliers (
            id TEXT PRIMARY KEY,
            display_name TEXT,
            data_accuracy REAL,
            error_rate REAL,
            compliance_score REAL,
            avg_response_secs REAL,
            last_submission_at TEXT,
            rollup_updated_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_submissions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submissions (
            id TEXT PRIMARY KEY,
            supplier_id TEXT NOT NULL REFERENCES suppliers(id),
            file_name TEXT NOT NULL,
            content_type TEXT NOT NULL CHECK (content_type IN ('xml', 'json')),
            file_size INTEGER NOT NULL,
            content_hash TEXT NOT NULL,
            instance_identifier TEXT,
            status TEXT NOT NULL CHECK (status IN (
                'received', 'processing', 'validated', 'failed', 'held', 'reprocessed'
            )),
            submitted_at TEXT NOT NULL,
            processing_started_at TEXT,
            completed_at TEXT,
            supersedes TEXT REFERENCES submissions(id),
            superseded_by TEXT REFERENCES submissions(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_submissions_supplier_submitted
         ON submissions(supplier_id, submitted_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_submissions_status ON submissions(status)")
        .execute(pool)
        .await?;

    // Duplicate detection: the same document may only be live once per supplier.
    // Failed submissions drop out of the index so a corrected upload can reuse them.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_submissions_supplier_hash
         ON submissions(supplier_id, content_hash)
         WHERE status != 'failed'",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_submissions_supplier_instance
         ON submissions(supplier_id, instance_identifier)
         WHERE instance_identifier IS NOT NULL AND status != 'failed'",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Parsed events, one row per event in document order
///
/// `payload` holds the full normalized event as JSON; the remaining columns
/// are denormalized for querying.
async fn create_submission_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submission_events (
            submission_id TEXT NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
            event_index INTEGER NOT NULL,
            event_kind TEXT NOT NULL,
            event_time TEXT,
            action TEXT,
            biz_step TEXT,
            line_number INTEGER,
            payload TEXT NOT NULL,
            PRIMARY KEY (submission_id, event_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_submission_documents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submission_documents (
            submission_id TEXT PRIMARY KEY REFERENCES submissions(id) ON DELETE CASCADE,
            content BLOB NOT NULL,
            stored_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_findings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS findings (
            id TEXT PRIMARY KEY,
            submission_id TEXT NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
            seq INTEGER NOT NULL,
            stage TEXT NOT NULL CHECK (stage IN ('structure', 'field', 'sequence', 'aggregation')),
            severity TEXT NOT NULL CHECK (severity IN ('error', 'warning')),
            message TEXT NOT NULL,
            field TEXT,
            line_number INTEGER,
            event_index INTEGER,
            created_at TEXT NOT NULL,
            is_resolved INTEGER NOT NULL DEFAULT 0,
            resolution_note TEXT,
            resolved_by TEXT,
            resolved_at TEXT,
            UNIQUE (submission_id, seq)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_weekly_trends_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weekly_trends (
            supplier_id TEXT NOT NULL REFERENCES suppliers(id) ON DELETE CASCADE,
            week_start TEXT NOT NULL,
            submissions INTEGER NOT NULL,
            failed_submissions INTEGER NOT NULL,
            error_findings INTEGER NOT NULL,
            error_rate REAL NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (supplier_id, week_start)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
