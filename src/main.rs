//! FileHub journal server.
//!
//! Main entry point that wires the history store, journal, file tree and
//! background rescans together and runs until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use filehub_core::config::{AppConfig, LogFormat};
use filehub_core::error::AppError;
use filehub_database::{DatabasePool, SqliteLifetimeStore};
use filehub_entity::PortablePath;
use filehub_history::Journal;
use filehub_storage::Sha256ContentHasher;
use filehub_tree::FileTree;
use filehub_worker::jobs::ScanDirectoryHandler;
use filehub_worker::{JobDispatcher, RescanScheduler};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("FILEHUB_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    AppConfig::load(&config_path)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.filter_directive()));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting FileHub journal v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    tracing::info!(url = %config.database.url, "Connecting to database...");
    let db_pool = DatabasePool::connect(&config.database).await?;
    filehub_database::migration::run_migrations(db_pool.pool()).await?;
    tracing::info!("Database migrations complete");
    let store = Arc::new(SqliteLifetimeStore::new(db_pool.pool().clone()));

    // ── Step 2: Journal ──────────────────────────────────────────
    let journal = Journal::start(&config.journal, store).await?;

    // ── Step 3: File tree, reconciled against the disk ───────────
    let tree = FileTree::builder(config.tree.clone(), journal.clone())
        .hasher(Arc::new(Sha256ContentHasher::new()))
        .open()
        .await?;
    let tree = Arc::new(tree);

    // ── Step 4: Shutdown channel ─────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 5: Background rescans ───────────────────────────────
    let mut dispatcher = JobDispatcher::new(&config.worker);
    dispatcher.register(Arc::new(ScanDirectoryHandler::new(Arc::clone(&tree))));
    let dispatcher = Arc::new(dispatcher);

    let rescan_handle = if config.worker.rescan_interval_seconds > 0 {
        let scheduler = RescanScheduler::new(
            Arc::clone(&dispatcher),
            Duration::from_secs(config.worker.rescan_interval_seconds),
            PortablePath::root(tree.root_alias()),
        );
        Some(tokio::spawn(scheduler.run(shutdown_rx.clone())))
    } else {
        tracing::info!("Periodic rescans disabled");
        None
    };

    tracing::info!(
        root = %tree.root_path().display(),
        nodes = tree.len(),
        "FileHub journal running"
    );

    // ── Step 6: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    if let Some(handle) = rescan_handle {
        let _ = tokio::time::timeout(Duration::from_secs(30), handle).await;
    }
    dispatcher.shutdown(Duration::from_secs(30)).await;

    journal.close().await?;
    db_pool.close().await;

    tracing::info!("FileHub journal shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
}
