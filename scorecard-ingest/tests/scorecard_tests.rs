//! Scorecard aggregation over stored submissions

mod helpers;

use chrono::{Duration, Utc};
use helpers::{create_memory_db, fixtures, test_service};
use scorecard_ingest::db;
use scorecard_ingest::models::ContentType;
use scorecard_ingest::services::{compute_scorecard, refresh_all, SubmitRequest};
use scorecard_ingest::PipelineError;

fn request(supplier_id: &str, file_name: &str, content: String) -> SubmitRequest {
    SubmitRequest {
        supplier_id: supplier_id.to_string(),
        file_name: file_name.to_string(),
        content_type: ContentType::Xml,
        supersedes: None,
        content: content.into_bytes(),
    }
}

#[tokio::test]
async fn test_window_without_submissions_is_all_zero() {
    let pool = create_memory_db().await;
    let service = test_service(&pool);

    service
        .submit(request("acme", "a.xml", fixtures::valid_document(Some("W-1"))))
        .await
        .unwrap();

    // A window that ends a year from now and is only a week long
    let report = compute_scorecard(&pool, "acme", 7, Utc::now() + Duration::days(365))
        .await
        .unwrap();

    assert_eq!(report.submissions.total, 0);
    assert_eq!(report.submissions.valid, 0);
    assert_eq!(report.submissions.invalid, 0);
    assert_eq!(report.validity_rate, 0.0);
    assert_eq!(report.errors.total, 0);
    assert_eq!(report.warnings.total, 0);
    assert_eq!(report.avg_response_secs, 0.0);
    assert_eq!(report.resolution_rate, 0.0);
    assert!(report.weekly.iter().all(|week| week.submissions == 0));
}

#[tokio::test]
async fn test_unknown_supplier_is_not_found() {
    let pool = create_memory_db().await;

    let err = compute_scorecard(&pool, "ghost", 30, Utc::now()).await.unwrap_err();
    assert!(
        matches!(&err, PipelineError::NotFound(_))
            || matches!(&err, PipelineError::Store(scorecard_common::Error::NotFound(_))),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn test_scorecard_counts_and_rates() {
    let pool = create_memory_db().await;
    let service = test_service(&pool);

    service
        .submit(request("acme", "a.xml", fixtures::valid_document(Some("S-1"))))
        .await
        .unwrap();
    service
        .submit(request("acme", "p.xml", fixtures::open_pack_document(Some("S-2"))))
        .await
        .unwrap();
    let failed = service
        .submit(request("acme", "b.xml", fixtures::missing_event_time_document(Some("S-3"))))
        .await
        .unwrap();
    service
        .submit(request("acme", "e.xml", fixtures::empty_event_list_document()))
        .await
        .unwrap();
    // Another supplier's upload never counts
    service
        .submit(request("globex", "g.xml", fixtures::valid_document(Some("S-4"))))
        .await
        .unwrap();

    let finding_id = service.get_submission(failed.submission_id).await.unwrap().findings[0].id;
    service
        .resolve_finding(finding_id, "fixed upstream", "qa")
        .await
        .unwrap();

    let report = compute_scorecard(&pool, "acme", 30, Utc::now()).await.unwrap();

    assert_eq!(report.supplier_id, "acme");
    assert_eq!(report.submissions.total, 4);
    assert_eq!(report.submissions.validated, 1);
    assert_eq!(report.submissions.held, 1);
    assert_eq!(report.submissions.failed, 2);
    assert_eq!(report.submissions.valid, 2);
    assert_eq!(report.submissions.invalid, 2);
    assert_eq!(report.validity_rate, 50.0);

    assert_eq!(report.warnings.total, 1);
    assert_eq!(report.warnings.unresolved, 1);
    assert!(report.errors.total >= 2);
    assert_eq!(report.errors.unresolved, report.errors.total - 1);
    assert_eq!(report.stages.field.errors, 1);
    assert_eq!(report.stages.aggregation.warnings, 1);
    assert!(report.stages.structure.errors >= 1);

    assert!(report.avg_response_secs >= 0.0);
    assert!(report.resolution_rate > 0.0 && report.resolution_rate < 100.0);

    let this_week: u64 = report.weekly.iter().map(|w| w.submissions).sum();
    assert_eq!(this_week, 4);
}

#[tokio::test]
async fn test_refresh_all_writes_rollups_and_trends() {
    let pool = create_memory_db().await;
    let service = test_service(&pool);

    service
        .submit(request("acme", "a.xml", fixtures::valid_document(Some("R-1"))))
        .await
        .unwrap();
    service
        .submit(request("globex", "b.xml", fixtures::missing_event_time_document(Some("R-2"))))
        .await
        .unwrap();
    db::suppliers::upsert_supplier(&pool, "initech", Some("Initech"))
        .await
        .unwrap();

    let refreshed = refresh_all(&pool, 90, Utc::now()).await.unwrap();
    assert_eq!(refreshed, 3);

    let acme = db::suppliers::get_supplier(&pool, "acme").await.unwrap();
    assert_eq!(acme.data_accuracy, Some(100.0));
    assert_eq!(acme.error_rate, Some(0.0));
    assert!(acme.last_submission_at.is_some());
    assert!(acme.rollup_updated_at.is_some());

    let globex = db::suppliers::get_supplier(&pool, "globex").await.unwrap();
    assert_eq!(globex.data_accuracy, Some(0.0));
    assert_eq!(globex.error_rate, Some(100.0));

    // No submissions: defined zeros, no last submission
    let initech = db::suppliers::get_supplier(&pool, "initech").await.unwrap();
    assert_eq!(initech.data_accuracy, Some(0.0));
    assert_eq!(initech.compliance_score, Some(0.0));
    assert!(initech.last_submission_at.is_none());

    let trends = db::trends::list_weekly_trends(&pool, "globex").await.unwrap();
    assert!(!trends.is_empty());
    let failed: u64 = trends.iter().map(|w| w.failed_submissions).sum();
    assert_eq!(failed, 1);
}
