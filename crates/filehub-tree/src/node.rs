//! In-memory descriptors of filesystem entries.
//!
//! Identity and kind never change after construction. Location fields sit
//! behind a per-node lock so traversals do not contend with edits elsewhere
//! in the tree; children are owned by their parent; the parent link is weak.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use chrono::{DateTime, Utc};

use filehub_core::error::{AppError, ErrorCode};
use filehub_core::result::AppResult;
use filehub_core::types::FileId;
use filehub_entity::PortablePath;

/// Size reported for a directory whose size has not been computed yet.
pub const UNKNOWN_SIZE: i64 = -1;

/// Everything needed to register a new node with a tree.
///
/// Either path may be left empty; the tree derives it from the other.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub id: FileId,
    pub is_dir: bool,
    pub parent_id: FileId,
    pub filename: Option<String>,
    pub abs_path: Option<PathBuf>,
    pub portable: Option<PortablePath>,
    pub size: i64,
    pub content_id: Option<String>,
    pub modify_time: Option<DateTime<Utc>>,
    pub read_only: bool,
}

impl NodeSpec {
    /// A node at `portable` under `parent_id` with a fresh identity.
    pub fn at(parent_id: FileId, portable: PortablePath) -> Self {
        Self {
            id: FileId::new(),
            is_dir: portable.is_dir(),
            parent_id,
            filename: None,
            abs_path: None,
            portable: Some(portable),
            size: UNKNOWN_SIZE,
            content_id: None,
            modify_time: None,
            read_only: false,
        }
    }
}

#[derive(Debug)]
struct NodeState {
    filename: String,
    abs_path: PathBuf,
    portable: PortablePath,
    parent: Weak<FileNode>,
    parent_id: Option<FileId>,
    content_id: Option<String>,
    modify_time: DateTime<Utc>,
}

/// One file or directory in a [`FileTree`](crate::FileTree).
#[derive(Debug)]
pub struct FileNode {
    id: FileId,
    is_dir: bool,
    read_only: bool,
    size: AtomicI64,
    state: RwLock<NodeState>,
    children: RwLock<HashMap<String, Arc<FileNode>>>,
}

/// A detached copy of a node's fields at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenNode {
    pub id: FileId,
    pub filename: String,
    pub abs_path: PathBuf,
    pub portable: PortablePath,
    pub is_dir: bool,
    pub size: i64,
    pub parent_id: Option<FileId>,
    pub content_id: Option<String>,
    pub modify_time: DateTime<Utc>,
}

impl FileNode {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: FileId,
        is_dir: bool,
        filename: String,
        abs_path: PathBuf,
        portable: PortablePath,
        parent: Option<&Arc<FileNode>>,
        size: i64,
        content_id: Option<String>,
        modify_time: DateTime<Utc>,
        read_only: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            is_dir,
            read_only,
            size: AtomicI64::new(size),
            state: RwLock::new(NodeState {
                filename,
                abs_path,
                portable,
                parent: parent.map(Arc::downgrade).unwrap_or_default(),
                parent_id: parent.map(|p| p.id),
                content_id,
                modify_time,
            }),
            children: RwLock::new(HashMap::new()),
        })
    }

    fn state(&self) -> RwLockReadGuard<'_, NodeState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, NodeState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn kids(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<FileNode>>> {
        self.children.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn kids_mut(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<FileNode>>> {
        self.children.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Byte size, or [`UNKNOWN_SIZE`] for a directory not yet measured.
    pub fn size(&self) -> i64 {
        self.size.load(Ordering::Acquire)
    }

    pub(crate) fn set_size(&self, size: i64) {
        self.size.store(size, Ordering::Release);
    }

    pub fn filename(&self) -> String {
        self.state().filename.clone()
    }

    pub fn abs_path(&self) -> PathBuf {
        self.state().abs_path.clone()
    }

    pub fn portable(&self) -> PortablePath {
        self.state().portable.clone()
    }

    pub fn parent(&self) -> Option<Arc<FileNode>> {
        self.state().parent.upgrade()
    }

    pub fn parent_id(&self) -> Option<FileId> {
        self.state().parent_id
    }

    pub fn content_id(&self) -> Option<String> {
        self.state().content_id.clone()
    }

    pub(crate) fn set_content_id(&self, content_id: Option<String>) {
        self.state_mut().content_id = content_id;
    }

    pub fn modify_time(&self) -> DateTime<Utc> {
        self.state().modify_time
    }

    pub(crate) fn touch_modified(&self) {
        self.state_mut().modify_time = Utc::now();
    }

    pub(crate) fn set_location(&self, filename: String, abs_path: PathBuf, portable: PortablePath) {
        let mut state = self.state_mut();
        state.filename = filename;
        state.abs_path = abs_path;
        state.portable = portable;
    }

    pub(crate) fn set_paths(&self, abs_path: PathBuf, portable: PortablePath) {
        let mut state = self.state_mut();
        state.abs_path = abs_path;
        state.portable = portable;
    }

    pub(crate) fn set_parent(&self, parent: &Arc<FileNode>) {
        let mut state = self.state_mut();
        state.parent = Arc::downgrade(parent);
        state.parent_id = Some(parent.id);
    }

    /// Children sorted by filename.
    pub fn children(&self) -> Vec<Arc<FileNode>> {
        let mut children: Vec<Arc<FileNode>> = self.kids().values().cloned().collect();
        children.sort_by_cached_key(|c| c.filename());
        children
    }

    pub fn child(&self, name: &str) -> Option<Arc<FileNode>> {
        self.kids().get(name).cloned()
    }

    pub fn child_count(&self) -> usize {
        self.kids().len()
    }

    pub(crate) fn add_child(&self, child: Arc<FileNode>) -> AppResult<()> {
        if !self.is_dir {
            return Err(AppError::coded(
                ErrorCode::DirectoryRequired,
                format!("Cannot add a child to file {}", self.id),
            ));
        }
        let name = child.filename();
        let mut kids = self.kids_mut();
        if kids.contains_key(&name) {
            return Err(AppError::coded(
                ErrorCode::AlreadyExists,
                format!("'{name}' already exists in {}", self.portable()),
            ));
        }
        kids.insert(name, child);
        Ok(())
    }

    pub(crate) fn remove_child(&self, name: &str) -> Option<Arc<FileNode>> {
        self.kids_mut().remove(name)
    }

    /// Whether `self` is `other` or one of its ancestors.
    pub fn is_ancestor_of(&self, other: &Arc<FileNode>) -> bool {
        let mut cursor = Some(Arc::clone(other));
        while let Some(node) = cursor {
            if node.id == self.id {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    /// This node and every descendant, parents before children.
    pub fn subtree(self: &Arc<Self>) -> Vec<Arc<FileNode>> {
        let mut out = Vec::new();
        let mut stack = vec![Arc::clone(self)];
        while let Some(node) = stack.pop() {
            let mut children = node.children();
            children.reverse();
            stack.extend(children);
            out.push(node);
        }
        out
    }

    /// This node and every descendant, children before parents.
    pub fn leaves_first(self: &Arc<Self>) -> Vec<Arc<FileNode>> {
        let mut out = self.subtree();
        out.reverse();
        out
    }

    /// This node followed by each ancestor up to the root.
    pub fn ancestors(self: &Arc<Self>) -> Vec<Arc<FileNode>> {
        let mut out = vec![Arc::clone(self)];
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            cursor = node.parent();
            out.push(node);
        }
        out
    }

    /// Snapshot the node's current fields.
    pub fn freeze(&self) -> FrozenNode {
        let state = self.state();
        FrozenNode {
            id: self.id,
            filename: state.filename.clone(),
            abs_path: state.abs_path.clone(),
            portable: state.portable.clone(),
            is_dir: self.is_dir,
            size: self.size(),
            parent_id: state.parent_id,
            content_id: state.content_id.clone(),
            modify_time: state.modify_time,
        }
    }
}
