//! CLI command definitions and dispatch.

pub mod history;
pub mod lifetime;
pub mod migrate;
pub mod scan;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use filehub_core::config::AppConfig;
use filehub_core::error::{AppError, ErrorKind};
use filehub_database::{DatabasePool, SqliteLifetimeStore};
use filehub_history::Journal;

/// FileHub journal inspection and reconciliation
#[derive(Debug, Parser)]
#[command(name = "filehub-cli", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Log more to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconcile the tree with the disk once and print the summary
    Scan(scan::ScanArgs),
    /// Actions on a path or its direct children, newest first
    History(history::HistoryArgs),
    /// Actions recorded strictly after a point in time
    Since(history::SinceArgs),
    /// Latest recorded action
    Latest,
    /// Children of a directory as they were at a point in time
    ChildrenAt(lifetime::ChildrenAtArgs),
    /// Every action of one lifetime
    Lifetime(lifetime::LifetimeArgs),
    /// Apply database migrations
    Migrate,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = load_config(&self.config)?;
        match &self.command {
            Commands::Scan(args) => scan::execute(args, &config, self.format).await,
            Commands::History(args) => history::history(args, &config, self.format).await,
            Commands::Since(args) => history::since(args, &config, self.format).await,
            Commands::Latest => history::latest(&config, self.format).await,
            Commands::ChildrenAt(args) => lifetime::children_at(args, &config, self.format).await,
            Commands::Lifetime(args) => lifetime::lifetime(args, &config, self.format).await,
            Commands::Migrate => migrate::execute(&config).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path)
}

/// Helper: connect to the history database and bring its schema up to date
pub async fn open_store(config: &AppConfig) -> Result<Arc<SqliteLifetimeStore>, AppError> {
    let pool = DatabasePool::connect(&config.database).await?;
    filehub_database::migration::run_migrations(pool.pool()).await?;
    Ok(Arc::new(SqliteLifetimeStore::new(pool.into_pool())))
}

/// Helper: start a journal over the history database
pub async fn open_journal(config: &AppConfig) -> Result<Journal, AppError> {
    let store = open_store(config).await?;
    Journal::start(&config.journal, store).await
}

/// Helper: parse an RFC 3339 timestamp argument
pub fn parse_time(value: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::with_source(ErrorKind::Validation, format!("Invalid time '{value}'"), e))
}
