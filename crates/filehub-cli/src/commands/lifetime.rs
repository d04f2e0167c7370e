//! Lifetime and point-in-time queries.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use filehub_core::config::AppConfig;
use filehub_core::error::{AppError, ErrorCode, ErrorKind};
use filehub_core::types::FileId;
use filehub_entity::{PastFile, PortablePath};

/// Arguments for `lifetime`
#[derive(Debug, Args)]
pub struct LifetimeArgs {
    /// Lifetime (file) ID
    pub id: String,
}

/// Arguments for `children-at`
#[derive(Debug, Args)]
pub struct ChildrenAtArgs {
    /// Portable path of the directory, e.g. `USERS:docs/`
    pub path: String,
    /// RFC 3339 timestamp
    pub time: String,
}

/// Past child display row
#[derive(Debug, Serialize, Tabled)]
struct ChildRow {
    /// File ID
    id: String,
    /// Path at the time
    path: String,
    /// Size
    size: i64,
    /// Directory
    dir: bool,
    /// Time of the action that produced this state
    as_of: String,
}

impl From<&PastFile> for ChildRow {
    fn from(p: &PastFile) -> Self {
        Self {
            id: p.id.to_string(),
            path: p.path.to_string(),
            size: p.size,
            dir: p.is_dir,
            as_of: p.as_of.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        }
    }
}

/// Print every action of one lifetime
pub async fn lifetime(args: &LifetimeArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let id: FileId = args.id.parse().map_err(|e| {
        AppError::with_source(ErrorKind::Validation, format!("Invalid lifetime id '{}'", args.id), e)
    })?;
    let journal = super::open_journal(config).await?;
    let lifetime = journal.get(id);
    journal.close().await?;

    let lifetime = lifetime.ok_or_else(|| {
        AppError::coded(ErrorCode::LifetimeNotFound, format!("No lifetime {id}"))
    })?;
    if format == OutputFormat::Table {
        output::print_kv("Lifetime", &lifetime.id.to_string());
        output::print_kv("Live", &lifetime.is_live().to_string());
        output::print_kv("Directory", &lifetime.is_dir.to_string());
        output::print_kv(
            "Path",
            &lifetime.latest_path().map(ToString::to_string).unwrap_or_default(),
        );
        output::print_actions(&lifetime.actions, format);
    } else {
        output::print_item(&lifetime, format);
    }
    Ok(())
}

/// Print the children a directory had at a point in time
pub async fn children_at(
    args: &ChildrenAtArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let path = PortablePath::parse(&args.path)?;
    let time = super::parse_time(&args.time)?;
    let journal = super::open_journal(config).await?;

    let folder = if path.is_root() {
        Some(FileId::root_for(path.root_alias()))
    } else {
        journal.get_all_lifetimes().into_iter().find_map(|l| {
            l.action_before(time)
                .and_then(PastFile::from_action)
                .filter(|p| p.path == path)
                .map(|p| p.id)
        })
    };
    let children = folder.map(|id| journal.get_past_folder_children(id, time));
    journal.close().await?;

    let children = children.ok_or_else(|| {
        AppError::coded(
            ErrorCode::FileNotFound,
            format!("{path} did not exist at {time}"),
        )
    })?;
    let rows: Vec<ChildRow> = children.iter().map(ChildRow::from).collect();
    output::print_list(&rows, format);
    Ok(())
}
