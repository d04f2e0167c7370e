//! Collaborator traits defined in `filehub-core` and implemented by other crates.

pub mod hasher;
pub mod watcher;

pub use hasher::ContentHasher;
pub use watcher::{FolderWatcher, NoopWatcher};
