//! Supplier drop-folder ingestion

mod helpers;

use helpers::{create_memory_db, fixtures, test_service};
use scorecard_ingest::services::{DropFolder, ScanReport};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn drop_file(inbox: &Path, supplier: &str, name: &str, content: &str) {
    let dir = inbox.join(supplier);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), content).unwrap();
}

async fn rows_for(pool: &SqlitePool, supplier: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE supplier_id = ?")
        .bind(supplier)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_dropped_document_is_submitted_and_archived() {
    let pool = create_memory_db().await;
    let temp_dir = TempDir::new().unwrap();
    let inbox = temp_dir.path().join("inbox");
    let drop_folder = DropFolder::new(inbox.clone(), test_service(&pool)).with_settle_time(Duration::ZERO);

    drop_file(&inbox, "acme", "a.xml", &fixtures::valid_document(Some("DF-1")));
    drop_file(&inbox, "acme", "b.xml", &fixtures::missing_event_time_document(Some("DF-2")));

    let report = drop_folder.scan_once().await.unwrap();
    assert_eq!(
        report,
        ScanReport {
            submitted: 2,
            ..Default::default()
        }
    );

    assert_eq!(rows_for(&pool, "acme").await, 2);
    assert!(inbox.join("acme/archived/a.xml").is_file());
    assert!(inbox.join("acme/archived/b.xml").is_file());
    assert!(!inbox.join("acme/a.xml").exists());

    // Archived files are not picked up again
    let again = drop_folder.scan_once().await.unwrap();
    assert!(again.is_empty(), "{:?}", again);
    assert_eq!(rows_for(&pool, "acme").await, 2);
}

#[tokio::test]
async fn test_duplicate_drop_is_moved_to_rejected() {
    let pool = create_memory_db().await;
    let temp_dir = TempDir::new().unwrap();
    let inbox = temp_dir.path().join("inbox");
    let drop_folder = DropFolder::new(inbox.clone(), test_service(&pool)).with_settle_time(Duration::ZERO);

    drop_file(&inbox, "acme", "a.xml", &fixtures::valid_document(Some("DF-3")));
    drop_folder.scan_once().await.unwrap();

    drop_file(&inbox, "acme", "a-copy.xml", &fixtures::valid_document(Some("DF-3")));
    let report = drop_folder.scan_once().await.unwrap();

    assert_eq!(report.duplicates, 1);
    assert_eq!(report.submitted, 0);
    assert!(inbox.join("acme/rejected/a-copy.xml").is_file());
    assert_eq!(rows_for(&pool, "acme").await, 1);
}

#[tokio::test]
async fn test_bad_supplier_directory_is_rejected() {
    let pool = create_memory_db().await;
    let temp_dir = TempDir::new().unwrap();
    let inbox = temp_dir.path().join("inbox");
    let drop_folder = DropFolder::new(inbox.clone(), test_service(&pool)).with_settle_time(Duration::ZERO);

    drop_file(&inbox, "acme pharma", "a.xml", &fixtures::valid_document(Some("DF-4")));
    drop_file(&inbox, "acme", "readme.txt", "not a document");

    let report = drop_folder.scan_once().await.unwrap();
    assert_eq!(report.rejected, 1);
    assert_eq!(report.submitted, 0);
    assert!(inbox.join("acme pharma/rejected/a.xml").is_file());

    // Files without an EPCIS extension are left alone
    assert!(inbox.join("acme/readme.txt").is_file());
    assert_eq!(file_count(&inbox.join("acme")), 1);
}

#[tokio::test]
async fn test_unsettled_file_waits_for_next_pass() {
    let pool = create_memory_db().await;
    let temp_dir = TempDir::new().unwrap();
    let inbox = temp_dir.path().join("inbox");
    let service = test_service(&pool);

    drop_file(&inbox, "acme", "a.xml", &fixtures::valid_document(Some("DF-5")));

    let patient = DropFolder::new(inbox.clone(), service.clone()).with_settle_time(Duration::from_secs(3600));
    assert!(patient.scan_once().await.unwrap().is_empty());
    assert!(inbox.join("acme/a.xml").is_file());

    let eager = DropFolder::new(inbox.clone(), service).with_settle_time(Duration::ZERO);
    assert_eq!(eager.scan_once().await.unwrap().submitted, 1);
}

#[tokio::test]
async fn test_missing_inbox_is_created() {
    let pool = create_memory_db().await;
    let temp_dir = TempDir::new().unwrap();
    let inbox = temp_dir.path().join("not-yet");

    let drop_folder = DropFolder::new(inbox.clone(), test_service(&pool));
    assert!(drop_folder.scan_once().await.unwrap().is_empty());
    assert!(inbox.is_dir());
    assert_eq!(drop_folder.inbox(), inbox.as_path());
}
