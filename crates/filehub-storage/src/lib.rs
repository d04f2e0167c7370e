//! # filehub-storage
//!
//! Local filesystem access for the file tree and the content hasher that
//! gives regular files their content ids.

pub mod disk;
pub mod hasher;

pub use disk::{DiskEntry, LocalDisk};
pub use hasher::Sha256ContentHasher;
