//! scorecard-ingest library interface
//!
//! EPCIS submission pipeline (parse → deduplicate → validate → persist),
//! supplier scorecards, and the HTTP API over both.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod parser;
pub mod services;
pub mod utils;
pub mod validators;

pub use crate::error::{ApiError, ApiResult, PipelineError, PipelineResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::PipelineConfig;
use crate::services::{DropFolder, SubmissionService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<PipelineConfig>,
    pub service: SubmissionService,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last background failure for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: PipelineConfig) -> Self {
        let config = Arc::new(config);
        Self {
            service: SubmissionService::new(db.clone(), config.clone()),
            db,
            config,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .merge(api::submission_routes())
        .merge(api::finding_routes())
        .merge(api::supplier_routes())
        .merge(api::scorecard_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        // Dashboard is served from another origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Periodically refresh every supplier's rollup
///
/// Returns `None` when `rollup_interval_secs` is 0. Failures are logged and
/// kept in `last_error`; the loop keeps running.
pub fn spawn_rollup_task(state: AppState) -> Option<JoinHandle<()>> {
    let interval_secs = state.config.rollup_interval_secs;
    if interval_secs == 0 {
        tracing::info!("Background rollup disabled (rollup_interval_secs = 0)");
        return None;
    }

    tracing::info!(interval_secs, "Background rollup task started");

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let window_days = state.config.scorecard_window_days;
            if let Err(e) = services::refresh_all(&state.db, window_days, Utc::now()).await {
                tracing::warn!(error = %e, "Background rollup failed");
                *state.last_error.write().await = Some(format!("Rollup refresh failed: {}", e));
            }
        }
    }))
}

/// Periodically submit documents dropped into `<inbox>/<supplier_id>/`
///
/// Returns `None` when `drop_folder_poll_secs` is 0.
pub fn spawn_drop_folder_task(state: AppState, inbox: PathBuf) -> Option<JoinHandle<()>> {
    let interval_secs = state.config.drop_folder_poll_secs;
    if interval_secs == 0 {
        tracing::info!("Drop folder disabled (drop_folder_poll_secs = 0)");
        return None;
    }

    tracing::info!(inbox = %inbox.display(), interval_secs, "Drop folder task started");
    let drop_folder = DropFolder::new(inbox, state.service.clone());

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if let Err(e) = drop_folder.scan_once().await {
                tracing::warn!(error = %e, "Drop folder scan failed");
                *state.last_error.write().await = Some(format!("Drop folder scan failed: {}", e));
            }
        }
    }))
}
