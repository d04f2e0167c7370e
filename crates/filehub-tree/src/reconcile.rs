//! Startup reconciliation of the journal's view against the disk.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{error, info, trace, warn};

use filehub_core::result::AppResult;
use filehub_core::types::FileId;
use filehub_entity::{FileAction, Lifetime, PortablePath};
use filehub_history::FileEvent;

use crate::tree::FileTree;

/// Counts from one [`FileTree::load_from_root`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Entries matched to a live lifetime.
    pub adopted: usize,
    /// Entries unknown to the journal, added with a Create action.
    pub discovered: usize,
    /// Entries unknown to the journal and left out of the tree.
    pub skipped: usize,
    /// Live lifetimes with no entry on disk, closed with a Delete action.
    pub missing: usize,
}

impl FileTree {
    /// Walk the disk breadth-first from the root and line it up with the
    /// journal's live lifetimes.
    ///
    /// Entries at the latest path of a live lifetime take that lifetime's
    /// identity. Unknown entries are created when `discovery` is set and
    /// skipped with their subtree otherwise. Lifetimes nobody claimed get a
    /// Delete action. Ends with a full size pass.
    pub async fn load_from_root(
        &self,
        event: &Arc<FileEvent>,
        discovery: bool,
    ) -> AppResult<ReconcileSummary> {
        let _guard = self.lock_structure().await;
        let alias = self.root_alias().to_string();

        let mut expected: HashMap<PortablePath, Lifetime> = HashMap::new();
        let mut duplicates: Vec<Lifetime> = Vec::new();
        for lifetime in self.journal.get_active_lifetimes() {
            let Some(path) = lifetime.latest_path() else {
                continue;
            };
            let path = if path.root_alias() == alias {
                path.clone()
            } else {
                path.overwrite_root(&alias)
            };
            let Some(other) = expected.remove(&path) else {
                expected.insert(path, lifetime);
                continue;
            };
            let rank = |l: &Lifetime| (self.contains(l.id), l.updated_at());
            let (kept, dropped) = if rank(&other) >= rank(&lifetime) {
                (other, lifetime)
            } else {
                (lifetime, other)
            };
            error!(
                path = %path,
                kept = %kept.id,
                dropped = %dropped.id,
                "Two live lifetimes share a path"
            );
            duplicates.push(dropped);
            expected.insert(path, kept);
        }
        let mut missing: HashSet<FileId> = expected.values().map(|l| l.id).collect();

        let mut summary = ReconcileSummary::default();
        let mut queue = VecDeque::from([Arc::clone(self.root())]);
        while let Some(dir) = queue.pop_front() {
            for entry in self.disk.read_dir(&dir.abs_path()).await? {
                if self.is_ignored(&entry.name) {
                    continue;
                }
                if let Some(existing) = dir.child(&entry.name) {
                    missing.remove(&existing.id());
                    if existing.is_dir() {
                        queue.push_back(existing);
                    }
                    continue;
                }

                let portable = dir.portable().child(&entry.name, entry.is_dir);
                let node = match expected.get(&portable) {
                    Some(lifetime) if !self.contains(lifetime.id) => {
                        missing.remove(&lifetime.id);
                        summary.adopted += 1;
                        self.add_entry(&dir, &entry, lifetime.id, lifetime.content_id.clone())?
                    }
                    _ if discovery => {
                        summary.discovered += 1;
                        self.import_entry(&dir, &entry, event).await?
                    }
                    _ => {
                        trace!(path = %portable, "Skipping entry unknown to the journal");
                        summary.skipped += 1;
                        continue;
                    }
                };
                if let Some(node) = node.filter(|n| n.is_dir()) {
                    queue.push_back(node);
                }
            }
        }

        let mut gone: Vec<&Lifetime> = expected
            .values()
            .filter(|l| missing.contains(&l.id))
            .chain(&duplicates)
            .collect();
        gone.sort_by_key(|l| l.latest_path().map(ToString::to_string));
        let stamp = event.stamp();
        for lifetime in gone {
            let Some(path) = lifetime.latest_path() else {
                continue;
            };
            warn!(file_id = %lifetime.id, path = %path, "File missing from disk");
            event.append(FileAction::deleted(
                &stamp,
                lifetime.id,
                path.clone(),
                lifetime.latest_action().and_then(|a| a.parent_id),
                lifetime.latest_size(),
                lifetime.content_id.clone(),
            ));
            summary.missing += 1;
        }

        self.resize_down_nodes(self.root(), event, &mut |_| {}).await?;

        info!(
            adopted = summary.adopted,
            discovered = summary.discovered,
            skipped = summary.skipped,
            missing = summary.missing,
            discovery,
            "Reconciled tree with disk"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_tree_at, start_journal};
    use filehub_core::config::TreeConfig;
    use filehub_database::MemoryLifetimeStore;
    use filehub_entity::FileActionType;

    #[tokio::test]
    async fn test_restart_adopts_identities() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryLifetimeStore::new());

        let journal = start_journal(store.clone()).await;
        let tree = open_tree_at(dir.path(), journal.clone(), true).await;
        let a = tree.mkdir(tree.root().id(), "a", None).await.unwrap().node().clone();
        let f = tree.touch(a.id(), "f.txt", None, None).await.unwrap();
        journal.close().await.unwrap();
        drop(tree);

        let journal = start_journal(store).await;
        let event = journal.new_event();
        let reopened = open_tree_at(dir.path(), journal.clone(), true).await;
        assert_eq!(reopened.len(), 3);
        let f2 = reopened
            .get_by_portable(&"USERS:a/f.txt".parse().unwrap())
            .unwrap();
        assert_eq!(f2.id(), f.id());
        assert_eq!(f2.parent_id(), Some(a.id()));

        let summary = reopened.load_from_root(&event, true).await.unwrap();
        assert_eq!(summary.adopted + summary.discovered + summary.missing, 0);
        assert!(event.is_empty());
    }

    #[tokio::test]
    async fn test_non_discovery_skips_unknown_subtrees() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("extra/deep")).await.unwrap();
        tokio::fs::write(dir.path().join("extra/deep/x"), b"x").await.unwrap();

        let journal = start_journal(Arc::new(MemoryLifetimeStore::new())).await;
        let tree = open_tree_at(dir.path(), journal, false).await;
        assert!(tree.is_empty());
        assert!(tree.root().child("extra").is_none());
    }

    #[tokio::test]
    async fn test_discovery_creates_unknown_entries() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("extra")).await.unwrap();
        tokio::fs::write(dir.path().join("extra/x"), b"xyz").await.unwrap();

        let journal = start_journal(Arc::new(MemoryLifetimeStore::new())).await;
        let tree = open_tree_at(dir.path(), journal.clone(), true).await;
        let extra = tree.root().child("extra").unwrap();
        assert_eq!(extra.size(), 3);

        let lifetime = journal.get(extra.id()).unwrap();
        let types: Vec<FileActionType> = lifetime.actions.iter().map(|a| a.action_type).collect();
        assert_eq!(types, vec![FileActionType::Create, FileActionType::SizeChange]);
        assert_eq!(lifetime.latest_size(), 3);
    }

    #[tokio::test]
    async fn test_missing_lifetime_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let journal = start_journal(Arc::new(MemoryLifetimeStore::new())).await;
        let tree = open_tree_at(dir.path(), journal.clone(), true).await;
        let f = tree.touch(tree.root().id(), "f", None, None).await.unwrap();
        tokio::fs::remove_file(f.abs_path()).await.unwrap();

        let config = TreeConfig {
            root_path: dir.path().to_string_lossy().into_owned(),
            ..TreeConfig::default()
        };
        let reopened = FileTree::builder(config, journal.clone()).open().await.unwrap();
        assert!(reopened.get(f.id()).is_none());
        assert!(!journal.get(f.id()).unwrap().is_live());
    }

    #[tokio::test]
    async fn test_shared_live_path_keeps_newest_lifetime() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("f"), b"x").await.unwrap();
        let journal = start_journal(Arc::new(MemoryLifetimeStore::new())).await;

        let (older, newer) = (FileId::new(), FileId::new());
        for id in [older, newer] {
            let event = journal.new_event();
            let path = PortablePath::parse("USERS:f").unwrap();
            event.append(FileAction::created(&event.stamp(), id, path, None, 1, None));
            journal.log_and_wait(event).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let tree = open_tree_at(dir.path(), journal.clone(), true).await;
        assert_eq!(tree.root().child("f").map(|n| n.id()), Some(newer));
        assert_eq!(tree.reconcile_summary().adopted, 1);
        assert_eq!(tree.reconcile_summary().missing, 1);
        assert!(journal.get(newer).unwrap().is_live());
        let dropped = journal.get(older).unwrap();
        assert!(!dropped.is_live());
        assert_eq!(
            dropped.latest_action().map(|a| a.action_type),
            Some(FileActionType::Delete)
        );
    }
}
