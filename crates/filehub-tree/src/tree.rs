//! The tree itself: node registry, path translation and construction.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};

use filehub_core::config::TreeConfig;
use filehub_core::error::{AppError, ErrorCode};
use filehub_core::result::AppResult;
use filehub_core::traits::{ContentHasher, FolderWatcher, NoopWatcher};
use filehub_core::types::FileId;
use filehub_entity::{EventStamp, PortablePath};
use filehub_history::{FileEvent, Journal};
use filehub_storage::LocalDisk;

use crate::node::{FileNode, NodeSpec, UNKNOWN_SIZE};
use crate::reconcile::ReconcileSummary;

/// In-memory mirror of one filesystem root.
///
/// The identity map has its own lock, held only for inserts, removals and
/// lookups. Structural operations that touch disk run one at a time.
pub struct FileTree {
    nodes: RwLock<HashMap<FileId, Arc<FileNode>>>,
    root: Arc<FileNode>,
    root_alias: String,
    pub(crate) disk: LocalDisk,
    pub(crate) journal: Journal,
    hasher: Option<Arc<dyn ContentHasher>>,
    watcher: Arc<dyn FolderWatcher>,
    ignore_filenames: HashSet<String>,
    discovery: bool,
    structure: Mutex<()>,
    opened_with: ReconcileSummary,
}

impl std::fmt::Debug for FileTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTree")
            .field("root_alias", &self.root_alias)
            .field("root_path", &self.disk.root())
            .field("nodes", &self.len())
            .field("discovery", &self.discovery)
            .finish()
    }
}

/// Builder for [`FileTree`].
pub struct FileTreeBuilder {
    config: TreeConfig,
    journal: Journal,
    hasher: Option<Arc<dyn ContentHasher>>,
    watcher: Arc<dyn FolderWatcher>,
}

impl FileTreeBuilder {
    /// Attach content ids computed by `hasher` to new files.
    pub fn hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    /// Register every directory the tree adds with `watcher`.
    pub fn watcher(mut self, watcher: Arc<dyn FolderWatcher>) -> Self {
        self.watcher = watcher;
        self
    }

    /// Create the root directory if needed, reconcile it against the
    /// journal and wait until the reconciliation has been logged.
    pub async fn open(self) -> AppResult<FileTree> {
        let alias = self.config.root_alias.clone();
        if alias.is_empty() || alias.contains(':') || alias.contains('/') {
            return Err(AppError::configuration(format!(
                "Invalid root alias '{alias}'"
            )));
        }

        let disk = LocalDisk::new(self.config.root_path.clone()).await?;
        let root = FileNode::new(
            FileId::root_for(&alias),
            true,
            alias.clone(),
            disk.root().to_path_buf(),
            PortablePath::root(&alias),
            None,
            UNKNOWN_SIZE,
            None,
            Utc::now(),
            false,
        );

        let hasher = self.hasher.filter(|_| self.config.hash_contents);
        let mut tree = FileTree {
            nodes: RwLock::new(HashMap::from([(root.id(), Arc::clone(&root))])),
            root,
            root_alias: alias,
            disk,
            journal: self.journal,
            hasher,
            watcher: self.watcher,
            ignore_filenames: self.config.ignore_filenames.into_iter().collect(),
            discovery: self.config.discovery,
            structure: Mutex::new(()),
            opened_with: ReconcileSummary::default(),
        };
        tree.watcher
            .watch_folder(tree.root.id(), &tree.root.abs_path())?;

        let event = tree.journal.new_event();
        tree.opened_with = tree.load_from_root(&event, tree.discovery).await?;
        let actions = event.len();
        tree.journal.log_and_wait(event).await?;

        info!(
            root = %tree.disk.root().display(),
            alias = %tree.root_alias,
            nodes = tree.len(),
            actions,
            "File tree loaded"
        );
        Ok(tree)
    }
}

/// Event used by one tree operation: the caller's, or a fresh one the
/// operation logs itself before returning.
pub(crate) struct EventScope {
    event: Arc<FileEvent>,
    local: bool,
}

impl EventScope {
    pub(crate) fn event(&self) -> &Arc<FileEvent> {
        &self.event
    }

    pub(crate) fn stamp(&self) -> EventStamp {
        self.event.stamp()
    }

    /// Queue a locally created event. Call while the structure lock is
    /// still held so events reach the journal in mutation order.
    pub(crate) async fn submit(self, journal: &Journal) -> AppResult<PendingEvent> {
        if !self.local {
            return Ok(PendingEvent(None));
        }
        journal.log_event(Arc::clone(&self.event)).await?;
        Ok(PendingEvent(Some(self.event)))
    }

    /// Queue the event on a failure path, so actions for changes that did
    /// happen are not lost, then hand back `err`.
    pub(crate) async fn abandon(self, journal: &Journal, err: AppError) -> AppError {
        if self.local && !self.event.is_empty() {
            let event_id = self.event.id();
            if let Err(log_err) = journal.log_event(Arc::clone(&self.event)).await {
                error!(%event_id, error = %log_err, "Failed to journal partial file event");
            }
        }
        err
    }
}

/// A submitted local event, waited on after the structure lock is released.
#[must_use]
pub(crate) struct PendingEvent(Option<Arc<FileEvent>>);

impl PendingEvent {
    pub(crate) async fn wait(self) -> AppResult<()> {
        match self.0 {
            Some(event) => event.wait().await,
            None => Ok(()),
        }
    }
}

impl FileTree {
    /// Start building a tree over `config.root_path`.
    pub fn builder(config: TreeConfig, journal: Journal) -> FileTreeBuilder {
        FileTreeBuilder {
            config,
            journal,
            hasher: None,
            watcher: Arc::new(NoopWatcher),
        }
    }

    fn read_nodes(&self) -> RwLockReadGuard<'_, HashMap<FileId, Arc<FileNode>>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_nodes(&self) -> RwLockWriteGuard<'_, HashMap<FileId, Arc<FileNode>>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) async fn lock_structure(&self) -> MutexGuard<'_, ()> {
        self.structure.lock().await
    }

    pub(crate) fn scope(&self, event: Option<&Arc<FileEvent>>) -> EventScope {
        match event {
            Some(event) => EventScope {
                event: Arc::clone(event),
                local: false,
            },
            None => EventScope {
                event: self.journal.new_event(),
                local: true,
            },
        }
    }

    pub fn root(&self) -> &Arc<FileNode> {
        &self.root
    }

    pub fn root_alias(&self) -> &str {
        &self.root_alias
    }

    /// Canonical absolute path of the root directory.
    pub fn root_path(&self) -> &Path {
        self.disk.root()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// What reconciliation found when the tree was opened.
    pub fn reconcile_summary(&self) -> ReconcileSummary {
        self.opened_with
    }

    /// Number of registered nodes, root included.
    pub fn len(&self) -> usize {
        self.read_nodes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    pub fn get(&self, id: FileId) -> Option<Arc<FileNode>> {
        self.read_nodes().get(&id).cloned()
    }

    pub fn contains(&self, id: FileId) -> bool {
        self.read_nodes().contains_key(&id)
    }

    pub(crate) fn require(&self, id: FileId) -> AppResult<Arc<FileNode>> {
        self.get(id).ok_or_else(|| {
            AppError::coded(ErrorCode::FileNotFound, format!("No file with id {id}"))
        })
    }

    /// Resolve a portable path by walking children from the root.
    pub fn get_by_portable(&self, path: &PortablePath) -> Option<Arc<FileNode>> {
        if path.root_alias() != self.root_alias {
            return None;
        }
        let mut node = Arc::clone(&self.root);
        for segment in path.rel_path().split('/').filter(|s| !s.is_empty()) {
            node = node.child(segment)?;
        }
        if !path.is_root() && node.is_dir() != path.is_dir() {
            return None;
        }
        Some(node)
    }

    /// Whether `filename` is never mirrored.
    pub fn is_ignored(&self, filename: &str) -> bool {
        self.ignore_filenames.contains(filename)
    }

    /// Register a node. Returns `None` when the filename is ignored.
    pub fn add(&self, spec: NodeSpec) -> AppResult<Option<Arc<FileNode>>> {
        if self.contains(spec.id) {
            return Err(AppError::coded(
                ErrorCode::DuplicateIdentity,
                format!("File {} is already in the tree", spec.id),
            ));
        }
        let parent = self.get(spec.parent_id).ok_or_else(|| {
            AppError::coded(
                ErrorCode::ParentNotFound,
                format!("No parent {} for file {}", spec.parent_id, spec.id),
            )
        })?;

        let (abs_path, portable) = match (spec.abs_path, spec.portable) {
            (Some(abs), Some(portable)) => (abs, portable),
            (Some(abs), None) => {
                let portable = self.abs_to_portable(&abs, spec.is_dir)?;
                (abs, portable)
            }
            (None, Some(portable)) => (self.portable_to_abs(&portable)?, portable),
            (None, None) => {
                let name = spec.filename.clone().unwrap_or_default();
                (
                    parent.abs_path().join(&name),
                    parent.portable().child(&name, spec.is_dir),
                )
            }
        };
        let filename = spec
            .filename
            .unwrap_or_else(|| portable.filename().to_string());
        if filename.is_empty() {
            return Err(AppError::coded(
                ErrorCode::FilenameRequired,
                format!("File {} has no name", spec.id),
            ));
        }
        if self.is_ignored(&filename) {
            debug!(filename = %filename, "Ignoring file");
            return Ok(None);
        }

        let node = FileNode::new(
            spec.id,
            spec.is_dir,
            filename,
            abs_path,
            portable,
            Some(&parent),
            spec.size,
            spec.content_id,
            spec.modify_time.unwrap_or_else(Utc::now),
            spec.read_only,
        );

        {
            let mut nodes = self.write_nodes();
            if nodes.contains_key(&node.id()) {
                return Err(AppError::coded(
                    ErrorCode::DuplicateIdentity,
                    format!("File {} is already in the tree", node.id()),
                ));
            }
            nodes.insert(node.id(), Arc::clone(&node));
        }
        if let Err(err) = parent.add_child(Arc::clone(&node)) {
            self.write_nodes().remove(&node.id());
            return Err(err);
        }

        if node.is_dir() {
            self.watcher.watch_folder(node.id(), &node.abs_path())?;
        }
        Ok(Some(node))
    }

    /// Detach a node from its parent and drop it and all its descendants
    /// from the registry. Returns the removed nodes, parents first.
    pub fn remove(&self, id: FileId) -> AppResult<Vec<Arc<FileNode>>> {
        if id == self.root.id() {
            return Err(AppError::coded(
                ErrorCode::RootFolder,
                "The root folder cannot be removed",
            ));
        }
        let node = self.require(id)?;
        if let Some(parent) = node.parent() {
            parent.remove_child(&node.filename());
        }

        let removed = node.subtree();
        let mut nodes = self.write_nodes();
        for n in &removed {
            nodes.remove(&n.id());
        }
        Ok(removed)
    }

    /// Translate an absolute path under the root into a portable path.
    pub fn abs_to_portable(&self, abs: &Path, is_dir: bool) -> AppResult<PortablePath> {
        let outside = || {
            AppError::coded(
                ErrorCode::PathOutsideRoot,
                format!(
                    "{} is outside of {}",
                    abs.display(),
                    self.disk.root().display()
                ),
            )
        };
        let rel = abs.strip_prefix(self.disk.root()).map_err(|_| outside())?;

        let mut segments = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_str().ok_or_else(|| {
                    AppError::coded(
                        ErrorCode::InvalidPortablePath,
                        format!("{} is not valid UTF-8", abs.display()),
                    )
                })?),
                _ => return Err(outside()),
            }
        }
        if segments.is_empty() {
            return Ok(PortablePath::root(&self.root_alias));
        }

        let mut rel_path = segments.join("/");
        if is_dir {
            rel_path.push('/');
        }
        Ok(PortablePath::new(&self.root_alias, rel_path))
    }

    /// Translate a portable path of this tree into an absolute path.
    pub fn portable_to_abs(&self, path: &PortablePath) -> AppResult<PathBuf> {
        if path.root_alias() != self.root_alias {
            return Err(AppError::coded(
                ErrorCode::RootAliasMismatch,
                format!(
                    "{path} does not belong to root '{}'",
                    self.root_alias
                ),
            ));
        }
        let mut abs = self.disk.root().to_path_buf();
        for segment in path.rel_path().split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(AppError::coded(
                    ErrorCode::InvalidPortablePath,
                    format!("{path} contains a relative segment"),
                ));
            }
            abs.push(segment);
        }
        Ok(abs)
    }

    /// Content id for the file at `abs`, when hashing is enabled and the
    /// file is not empty.
    pub(crate) async fn content_id_for(&self, abs: &Path, size: i64) -> AppResult<Option<String>> {
        match &self.hasher {
            Some(hasher) if size > 0 => Ok(Some(hasher.hash_file(abs).await?)),
            _ => Ok(None),
        }
    }
}

pub(crate) fn validate_filename(name: &str) -> AppResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(AppError::coded(
            ErrorCode::FilenameRequired,
            format!("'{name}' is not a valid filename"),
        ));
    }
    Ok(())
}
