//! Directory scans: bring a subtree of the tree in line with the disk.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace};

use filehub_core::error::{AppError, ErrorCode};
use filehub_core::result::AppResult;
use filehub_core::types::FileId;
use filehub_entity::FileAction;
use filehub_history::FileEvent;
use filehub_storage::DiskEntry;

use crate::node::{FileNode, NodeSpec, UNKNOWN_SIZE};
use crate::tree::FileTree;

/// Counts from one [`FileTree::scan_directory`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Directories listed.
    pub directories: usize,
    /// Entries found on disk and added to the tree.
    pub created: usize,
    /// Nodes dropped because their entry is gone from disk.
    pub deleted: usize,
}

impl FileTree {
    /// Import entries under `id` that the tree does not know and drop
    /// nodes whose entry has disappeared, recursively.
    pub async fn scan_directory(
        &self,
        id: FileId,
        event: Option<&Arc<FileEvent>>,
    ) -> AppResult<ScanSummary> {
        let guard = self.lock_structure().await;
        let dir = self.require(id)?;
        if !dir.is_dir() {
            return Err(AppError::coded(
                ErrorCode::DirectoryRequired,
                format!("{} is not a directory", dir.portable()),
            ));
        }

        let scope = self.scope(event);
        let summary = match self.scan_locked(&dir, scope.event()).await {
            Ok(summary) => summary,
            Err(err) => return Err(scope.abandon(&self.journal, err).await),
        };
        debug!(
            path = %dir.portable(),
            directories = summary.directories,
            created = summary.created,
            deleted = summary.deleted,
            "Scanned directory"
        );
        let pending = scope.submit(&self.journal).await?;
        drop(guard);
        pending.wait().await?;
        Ok(summary)
    }

    pub(crate) async fn scan_locked(
        &self,
        dir: &Arc<FileNode>,
        event: &Arc<FileEvent>,
    ) -> AppResult<ScanSummary> {
        let mut summary = ScanSummary::default();
        let mut queue = VecDeque::from([Arc::clone(dir)]);

        while let Some(current) = queue.pop_front() {
            summary.directories += 1;
            let mut seen = HashSet::new();

            for entry in self.disk.read_dir(&current.abs_path()).await? {
                if self.is_ignored(&entry.name) {
                    continue;
                }
                seen.insert(entry.name.clone());

                if let Some(child) = current.child(&entry.name) {
                    if child.is_dir() == entry.is_dir {
                        if child.is_dir() {
                            queue.push_back(child);
                        }
                        continue;
                    }
                    trace!(path = %child.portable(), "Entry changed kind on disk");
                    summary.deleted += self.drop_subtree(&child, event)?;
                }

                if let Some(node) = self.import_entry(&current, &entry, event).await? {
                    summary.created += 1;
                    if node.is_dir() {
                        queue.push_back(node);
                    }
                }
            }

            for child in current.children() {
                if !seen.contains(&child.filename()) {
                    trace!(path = %child.portable(), "Entry gone from disk");
                    summary.deleted += self.drop_subtree(&child, event)?;
                }
            }
        }
        Ok(summary)
    }

    /// Register a disk entry under `parent` with the given identity.
    pub(crate) fn add_entry(
        &self,
        parent: &Arc<FileNode>,
        entry: &DiskEntry,
        id: FileId,
        content_id: Option<String>,
    ) -> AppResult<Option<Arc<FileNode>>> {
        let mut spec = NodeSpec::at(parent.id(), parent.portable().child(&entry.name, entry.is_dir));
        spec.id = id;
        spec.filename = Some(entry.name.clone());
        spec.abs_path = Some(entry.path.clone());
        spec.size = if entry.is_dir { UNKNOWN_SIZE } else { entry.size };
        spec.content_id = content_id;
        spec.modify_time = entry.modified;
        self.add(spec)
    }

    /// Register a disk entry under a fresh identity and record its creation.
    pub(crate) async fn import_entry(
        &self,
        parent: &Arc<FileNode>,
        entry: &DiskEntry,
        event: &Arc<FileEvent>,
    ) -> AppResult<Option<Arc<FileNode>>> {
        let content_id = if entry.is_dir {
            None
        } else {
            self.content_id_for(&entry.path, entry.size).await?
        };
        let Some(node) = self.add_entry(parent, entry, FileId::new(), content_id)? else {
            return Ok(None);
        };
        event.append(FileAction::created(
            &event.stamp(),
            node.id(),
            node.portable(),
            node.parent_id(),
            node.size(),
            node.content_id(),
        ));
        Ok(Some(node))
    }

    fn drop_subtree(&self, node: &Arc<FileNode>, event: &Arc<FileEvent>) -> AppResult<usize> {
        let removed = self.remove(node.id())?;
        let stamp = event.stamp();
        event.extend(removed.iter().map(|n| {
            FileAction::deleted(
                &stamp,
                n.id(),
                n.portable(),
                n.parent_id(),
                n.size(),
                n.content_id(),
            )
        }));
        Ok(removed.len())
    }
}
