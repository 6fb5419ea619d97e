//! Pipeline configuration from TOML file and settings table
//!
//! Tests clear the SCORECARD_* variables first and run #[serial] so the
//! process environment cannot leak between them.

mod helpers;

use helpers::{create_test_db, fixtures};
use scorecard_common::config::{load_or_default, write_toml_config, PipelineSection, TomlConfig};
use scorecard_ingest::config::{
    PipelineConfig, ENV_AGGREGATION_OPEN_WINDOW_HOURS, ENV_DISPOSITION_RULE, ENV_DROP_FOLDER_POLL_SECS,
    ENV_HOLD_POLICY, ENV_MAX_LOCK_WAIT_MS, ENV_MAX_UPLOAD_BYTES, ENV_ROLLUP_INTERVAL_SECS,
    ENV_SCORECARD_WINDOW_DAYS,
};
use scorecard_ingest::db::settings;
use scorecard_ingest::models::{ContentType, SubmissionStatus};
use scorecard_ingest::services::{SubmissionService, SubmitRequest};
use scorecard_ingest::validators::HoldPolicy;
use serial_test::serial;
use std::sync::Arc;

fn clear_env() {
    for var in [
        ENV_HOLD_POLICY,
        ENV_AGGREGATION_OPEN_WINDOW_HOURS,
        ENV_MAX_UPLOAD_BYTES,
        ENV_SCORECARD_WINDOW_DAYS,
        ENV_ROLLUP_INTERVAL_SECS,
        ENV_MAX_LOCK_WAIT_MS,
        ENV_DISPOSITION_RULE,
        ENV_DROP_FOLDER_POLL_SECS,
    ] {
        std::env::remove_var(var);
    }
}

fn open_pack_request() -> SubmitRequest {
    SubmitRequest {
        supplier_id: "packer".to_string(),
        file_name: "pack.xml".to_string(),
        content_type: ContentType::Xml,
        supersedes: None,
        content: fixtures::open_pack_document(None).into_bytes(),
    }
}

#[tokio::test]
#[serial]
async fn test_toml_file_feeds_pipeline_config() {
    clear_env();
    let (temp_dir, pool) = create_test_db().await.unwrap();
    let path = temp_dir.path().join("scorecard.toml");

    let toml_config = TomlConfig {
        pipeline: PipelineSection {
            hold_policy: Some("open_aggregation".to_string()),
            aggregation_open_window_hours: Some(24),
            scorecard_window_days: Some(30),
            rollup_interval_secs: Some(0),
            ..Default::default()
        },
        ..Default::default()
    };
    write_toml_config(&toml_config, &path).unwrap();

    let loaded = load_or_default(Some(&path));
    let config = PipelineConfig::resolve(&pool, &loaded).await.unwrap();

    assert_eq!(config.hold_policy, HoldPolicy::OpenAggregation);
    assert_eq!(config.aggregation_open_window_hours, Some(24));
    assert_eq!(config.scorecard_window_days, 30);
    assert_eq!(config.rollup_interval_secs, 0);
    assert_eq!(config.max_upload_bytes, PipelineConfig::default().max_upload_bytes);
}

#[tokio::test]
#[serial]
async fn test_database_setting_changes_validation_outcome() {
    clear_env();
    let (_temp_dir, pool) = create_test_db().await.unwrap();

    // Defaults: an open pack holds the document
    let config = PipelineConfig::resolve(&pool, &TomlConfig::default()).await.unwrap();
    let service = SubmissionService::new(pool.clone(), Arc::new(config));
    let receipt = service.submit(open_pack_request()).await.unwrap();
    assert_eq!(receipt.status, SubmissionStatus::Held);

    // A young pack is in flight under a window policy
    settings::set_setting(&pool, settings::HOLD_POLICY, HoldPolicy::OpenAggregation)
        .await
        .unwrap();
    settings::set_setting(&pool, settings::AGGREGATION_OPEN_WINDOW_HOURS, 24u64)
        .await
        .unwrap();

    let config = PipelineConfig::resolve(&pool, &TomlConfig::default()).await.unwrap();
    let service = SubmissionService::new(pool.clone(), Arc::new(config));

    let mut request = open_pack_request();
    request.supplier_id = "packer-2".to_string();
    let receipt = service.submit(request).await.unwrap();
    assert_eq!(receipt.status, SubmissionStatus::Validated);
    assert_eq!(receipt.warning_count, 0);
}

#[tokio::test]
#[serial]
async fn test_database_setting_beats_toml() {
    clear_env();
    let (_temp_dir, pool) = create_test_db().await.unwrap();

    settings::set_setting(&pool, settings::MAX_UPLOAD_BYTES, 2048usize)
        .await
        .unwrap();

    let toml_config = TomlConfig {
        pipeline: PipelineSection {
            max_upload_bytes: Some(1024),
            ..Default::default()
        },
        ..Default::default()
    };
    let config = PipelineConfig::resolve(&pool, &toml_config).await.unwrap();
    assert_eq!(config.max_upload_bytes, 2048);

    let service = SubmissionService::new(pool, Arc::new(config));
    let mut request = open_pack_request();
    request.content = vec![b' '; 4096];
    assert!(service.submit(request).await.is_err());
}

#[tokio::test]
#[serial]
async fn test_corrupt_database_setting_is_an_error() {
    clear_env();
    let (_temp_dir, pool) = create_test_db().await.unwrap();

    settings::set_setting(&pool, settings::SCORECARD_WINDOW_DAYS, "ninety")
        .await
        .unwrap();

    let result = PipelineConfig::resolve(&pool, &TomlConfig::default()).await;
    assert!(result.is_err());
}
