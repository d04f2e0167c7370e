//! Directory scan job: scan, resize and journal one directory.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing;

use filehub_entity::PortablePath;
use filehub_tree::FileTree;

use crate::executor::{JobContext, JobExecutionError, JobHandler};

/// Job type of [`ScanDirectoryHandler`].
pub const SCAN_DIRECTORY: &str = "scan_directory";

#[derive(Debug, Deserialize)]
struct ScanPayload {
    path: String,
}

/// Brings a directory of the tree in line with the disk.
///
/// Payload: `{"path": "<portable path of a directory>"}`.
#[derive(Debug)]
pub struct ScanDirectoryHandler {
    tree: Arc<FileTree>,
}

impl ScanDirectoryHandler {
    pub fn new(tree: Arc<FileTree>) -> Self {
        Self { tree }
    }
}

#[async_trait]
impl JobHandler for ScanDirectoryHandler {
    fn job_type(&self) -> &str {
        SCAN_DIRECTORY
    }

    async fn execute(
        &self,
        ctx: &JobContext,
        payload: &Value,
    ) -> Result<Option<Value>, JobExecutionError> {
        let payload: ScanPayload = serde_json::from_value(payload.clone())
            .map_err(|e| JobExecutionError::Permanent(format!("Invalid scan payload: {e}")))?;
        let path = PortablePath::parse(&payload.path)
            .map_err(|e| JobExecutionError::Permanent(e.to_string()))?;
        let dir = self
            .tree
            .get_by_portable(&path)
            .filter(|n| n.is_dir())
            .ok_or_else(|| JobExecutionError::Permanent(format!("No directory at {path}")))?;

        ctx.checkpoint()?;
        let journal = self.tree.journal();
        let event = journal.new_event();
        let summary = self.tree.scan_directory(dir.id(), Some(&event)).await?;

        if ctx.is_cancelled() {
            // The tree already reflects the scan.
            journal.log_and_wait(event).await?;
            return Err(JobExecutionError::Cancelled);
        }
        self.tree.resize_down(dir.id(), Some(&event), |_| {}).await?;

        let actions = event.len();
        journal.log_and_wait(event).await?;
        tracing::info!(
            job_id = %ctx.job_id(),
            path = %path,
            created = summary.created,
            deleted = summary.deleted,
            actions,
            "Directory scan complete"
        );

        Ok(Some(serde_json::json!({
            "path": path.to_string(),
            "directories": summary.directories,
            "created": summary.created,
            "deleted": summary.deleted,
            "actions": actions,
        })))
    }
}
