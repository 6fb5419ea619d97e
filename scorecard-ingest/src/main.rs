//! scorecard-ingest - EPCIS supplier scorecard service
//!
//! Receives supplier EPCIS documents over HTTP, validates them, stores the
//! graded findings and serves per-supplier scorecards.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;

use scorecard_common::config::{
    default_config_path, load_or_default, write_toml_config, CompiledDefaults, RootFolderInitializer,
    RootFolderResolver, TomlConfig,
};
use scorecard_ingest::config::PipelineConfig;
use scorecard_ingest::{build_router, spawn_drop_folder_task, spawn_rollup_task, AppState};

/// Command-line arguments for scorecard-ingest
#[derive(Parser, Debug)]
#[command(name = "scorecard-ingest")]
#[command(about = "EPCIS submission validation and supplier scorecard service")]
#[command(version)]
struct Args {
    /// Root folder holding the database and supplier inbox (overrides SCORECARD_ROOT and TOML)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "SCORECARD_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, env = "SCORECARD_BIND")]
    bind: Option<String>,

    /// Write a default config file (if none exists) and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let defaults = CompiledDefaults::for_current_platform();

    let config_path = args.config.clone().or_else(default_config_path);
    let toml_config = load_or_default(config_path.as_deref());

    let default_level = if toml_config.logging.level.trim().is_empty() {
        defaults.log_level.clone()
    } else {
        toml_config.logging.level.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    info!("Starting scorecard-ingest v{}", env!("CARGO_PKG_VERSION"));

    if args.init_config {
        let path = config_path.context("No config path available on this platform")?;
        if path.exists() {
            info!("Config file already exists: {}", path.display());
        } else {
            write_toml_config(&TomlConfig::default(), &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote default config: {}", path.display());
        }
        return Ok(());
    }

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder.clone())
        .with_toml(&toml_config)
        .resolve();

    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());

    let db_pool = scorecard_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let pipeline_config = PipelineConfig::resolve(&db_pool, &toml_config)
        .await
        .context("Invalid pipeline configuration")?;

    let state = AppState::new(db_pool, pipeline_config);
    let rollup_task = spawn_rollup_task(state.clone());
    let drop_folder_task = spawn_drop_folder_task(state.clone(), initializer.inbox_path());
    let app = build_router(state);

    let bind = args
        .bind
        .or(toml_config.bind_address)
        .unwrap_or(defaults.bind_address);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    for task in [rollup_task, drop_folder_task].into_iter().flatten() {
        task.abort();
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
