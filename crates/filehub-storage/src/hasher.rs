//! SHA-256 content identity.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::trace;

use filehub_core::error::{AppError, ErrorCode, ErrorKind};
use filehub_core::result::AppResult;
use filehub_core::traits::ContentHasher;

/// Content ids are the lowercase hex SHA-256 digest of the file bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256ContentHasher;

impl Sha256ContentHasher {
    /// Create a hasher.
    pub fn new() -> Self {
        Self
    }

    /// Content id of an in-memory buffer.
    pub fn hash_bytes(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }
}

#[async_trait]
impl ContentHasher for Sha256ContentHasher {
    async fn hash_file(&self, path: &Path) -> AppResult<String> {
        let file = fs::File::open(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::coded(
                    ErrorCode::FileNotFound,
                    format!("File not found: {}", path.display()),
                )
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to open file: {}", path.display()),
                    e,
                )
            }
        })?;

        let mut hasher = Sha256::new();
        let mut stream = ReaderStream::new(file);
        let mut total = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| AppError::with_source(ErrorKind::Storage, "Stream read error", e))?;
            total += chunk.len();
            hasher.update(&chunk);
        }

        let content_id = hex::encode(hasher.finalize());
        trace!(path = %path.display(), bytes = total, content_id = %content_id, "Hashed file");
        Ok(content_id)
    }
}
