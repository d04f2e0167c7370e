//! Action history queries.

use clap::Args;

use crate::output::{self, OutputFormat};
use filehub_core::config::AppConfig;
use filehub_core::error::AppError;
use filehub_database::LifetimeStore;
use filehub_entity::PortablePath;

/// Arguments for `history`
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Portable path, e.g. `USERS:docs/`
    pub path: String,
}

/// Arguments for `since`
#[derive(Debug, Args)]
pub struct SinceArgs {
    /// RFC 3339 timestamp; actions at exactly this time are excluded
    pub time: String,
}

/// Print actions touching a path or its direct children
pub async fn history(
    args: &HistoryArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let path = PortablePath::parse(&args.path)?;
    let store = super::open_store(config).await?;
    let actions = store
        .get_actions_by_path(&config.journal.server_id, &path)
        .await?;
    output::print_actions(&actions, format);
    Ok(())
}

/// Print every action after a point in time, oldest first
pub async fn since(args: &SinceArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let time = super::parse_time(&args.time)?;
    let journal = super::open_journal(config).await?;
    let actions = journal.get_actions_since(time);
    journal.close().await?;
    output::print_actions(&actions, format);
    Ok(())
}

/// Print the most recent action
pub async fn latest(config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let store = super::open_store(config).await?;
    match store.get_latest_action(&config.journal.server_id).await? {
        Some(action) => output::print_actions(std::slice::from_ref(&action), format),
        None => println!("No actions recorded."),
    }
    Ok(())
}
