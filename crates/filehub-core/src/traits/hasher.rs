//! Content identity service.

use std::path::Path;

use async_trait::async_trait;

use crate::result::AppResult;

/// Computes a stable content id from a regular file's bytes.
///
/// The tree attaches the returned id to nodes and lifetimes; it never
/// derives one itself. Implementations live in `filehub-storage`.
#[async_trait]
pub trait ContentHasher: Send + Sync + std::fmt::Debug + 'static {
    /// Hash the file at `path` and return its content id.
    async fn hash_file(&self, path: &Path) -> AppResult<String>;
}
