//! Directory-change notification hook.

use std::path::Path;

use crate::result::AppResult;
use crate::types::FileId;

/// Registered for every directory the tree adds.
pub trait FolderWatcher: Send + Sync + std::fmt::Debug + 'static {
    /// Begin watching `abs_path`, the directory with identity `id`.
    fn watch_folder(&self, id: FileId, abs_path: &Path) -> AppResult<()>;
}

/// Watcher that ignores every registration.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWatcher;

impl FolderWatcher for NoopWatcher {
    fn watch_folder(&self, _id: FileId, _abs_path: &Path) -> AppResult<()> {
        Ok(())
    }
}
