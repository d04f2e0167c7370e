//! # filehub-tree
//!
//! In-memory mirror of one filesystem root. Every node carries a stable
//! identity that survives renames; every structural change is recorded as
//! file actions on a [`FileEvent`](filehub_history::FileEvent) and handed to
//! the journal.

pub mod node;
pub mod ops;
pub mod reconcile;
pub mod resize;
pub mod scan;
pub mod tree;

pub use node::{FileNode, FrozenNode, NodeSpec, UNKNOWN_SIZE};
pub use ops::{MkDirResult, MoveInfo};
pub use reconcile::ReconcileSummary;
pub use scan::ScanSummary;
pub use tree::{FileTree, FileTreeBuilder};
