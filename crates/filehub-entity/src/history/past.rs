//! Point-in-time view of a file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use filehub_core::types::FileId;

use super::action::FileAction;
use crate::path::PortablePath;

/// What a file looked like at some past instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastFile {
    /// File identity.
    pub id: FileId,
    /// Location at that instant.
    pub path: PortablePath,
    /// Parent folder at that instant.
    pub parent_id: Option<FileId>,
    /// Size at that instant.
    pub size: i64,
    /// Content id at that instant.
    pub content_id: Option<String>,
    /// Whether the file is a directory.
    pub is_dir: bool,
    /// Timestamp of the action the view was taken from.
    pub as_of: DateTime<Utc>,
}

impl PastFile {
    /// Build the view from the action in effect. Returns `None` for a
    /// deletion, since the file did not exist then.
    pub fn from_action(action: &FileAction) -> Option<Self> {
        let path = action.destination_path.clone()?;
        Some(Self {
            id: action.lifetime_id,
            is_dir: path.is_dir(),
            path,
            parent_id: action.parent_id,
            size: action.size,
            content_id: action.content_id.clone(),
            as_of: action.timestamp,
        })
    }
}
