//! One-shot reconciliation of the tree against the disk.

use std::sync::Arc;

use clap::Args;

use crate::output::{self, OutputFormat};
use filehub_core::config::AppConfig;
use filehub_core::error::AppError;
use filehub_storage::Sha256ContentHasher;
use filehub_tree::FileTree;

/// Arguments for `scan`
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Adopt entries unknown to the journal, overriding `tree.discovery`
    #[arg(long)]
    pub discovery: Option<bool>,
}

/// Open the tree, which reconciles it, then print what changed
pub async fn execute(args: &ScanArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let mut tree_config = config.tree.clone();
    if let Some(discovery) = args.discovery {
        tree_config.discovery = discovery;
    }

    let journal = super::open_journal(config).await?;
    let tree = FileTree::builder(tree_config, journal.clone())
        .hasher(Arc::new(Sha256ContentHasher::new()))
        .open()
        .await?;
    let summary = tree.reconcile_summary();
    let nodes = tree.len();
    journal.close().await?;

    match format {
        OutputFormat::Table => {
            output::print_success(&format!("Reconciled {}", tree.root_path().display()));
            output::print_kv("Nodes", &nodes.to_string());
            output::print_kv("Adopted", &summary.adopted.to_string());
            output::print_kv("Discovered", &summary.discovered.to_string());
            output::print_kv("Skipped", &summary.skipped.to_string());
            output::print_kv("Missing", &summary.missing.to_string());
        }
        OutputFormat::Json => output::print_item(
            &serde_json::json!({
                "root": tree.root_path().display().to_string(),
                "nodes": nodes,
                "adopted": summary.adopted,
                "discovered": summary.discovered,
                "skipped": summary.skipped,
                "missing": summary.missing,
            }),
            format,
        ),
    }
    Ok(())
}
