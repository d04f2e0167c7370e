//! Immutable records of single file state transitions.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use filehub_core::types::{FileEventId, FileId};
use filehub_core::{AppError, AppResult};

use crate::path::PortablePath;

/// Kind of transition recorded by a [`FileAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileActionType {
    /// The file came into existence.
    Create,
    /// The file was renamed or moved.
    Move,
    /// The file's size was recomputed to a new value.
    SizeChange,
    /// The file was removed. Terminal for its lifetime.
    Delete,
    /// The file was recreated from a backup.
    Restore,
    /// The file was copied to a backup server.
    Backup,
}

impl FileActionType {
    /// Whether this action opens a new lifetime.
    pub fn is_creation(&self) -> bool {
        matches!(self, Self::Create | Self::Restore)
    }

    /// Return the action type as a snake_case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Move => "move",
            Self::SizeChange => "size_change",
            Self::Delete => "delete",
            Self::Restore => "restore",
            Self::Backup => "backup",
        }
    }
}

impl fmt::Display for FileActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileActionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "move" => Ok(Self::Move),
            "size_change" => Ok(Self::SizeChange),
            "delete" => Ok(Self::Delete),
            "restore" => Ok(Self::Restore),
            "backup" => Ok(Self::Backup),
            other => Err(AppError::validation(format!("Unknown action type '{other}'"))),
        }
    }
}

/// Event membership shared by every action appended to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStamp {
    /// The event the action belongs to.
    pub event_id: FileEventId,
    /// The server that produced the event.
    pub server_id: String,
}

/// One state transition of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAction {
    /// When the transition happened, at microsecond precision.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub action_type: FileActionType,
    /// Where the file was before. Absent for creations.
    pub origin_path: Option<PortablePath>,
    /// Where the file is after. Absent for deletions.
    pub destination_path: Option<PortablePath>,
    /// The file identity, which is also the lifetime id.
    pub lifetime_id: FileId,
    /// Event this action was recorded in.
    pub event_id: FileEventId,
    /// Parent folder identity after the transition.
    pub parent_id: Option<FileId>,
    /// Size in bytes after the transition; -1 when not yet computed.
    pub size: i64,
    /// Server that recorded the action.
    pub server_id: String,
    /// Content id of the file bytes, if known.
    pub content_id: Option<String>,
}

static LAST_ACTION_MICROS: AtomicI64 = AtomicI64::new(0);

/// Current time at the precision the history store keeps.
///
/// Strictly increasing within a process, so actions recorded here never
/// share a timestamp and sort in the order they were produced.
pub fn action_timestamp() -> DateTime<Utc> {
    let now = Utc::now().timestamp_micros();
    let mut last = LAST_ACTION_MICROS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_ACTION_MICROS.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => {
                return DateTime::from_timestamp_micros(next)
                    .unwrap_or_else(|| Utc::now().trunc_subsecs(6));
            }
            Err(observed) => last = observed,
        }
    }
}

impl FileAction {
    #[allow(clippy::too_many_arguments)]
    fn stamped(
        stamp: &EventStamp,
        action_type: FileActionType,
        lifetime_id: FileId,
        origin_path: Option<PortablePath>,
        destination_path: Option<PortablePath>,
        parent_id: Option<FileId>,
        size: i64,
        content_id: Option<String>,
    ) -> Self {
        Self {
            timestamp: action_timestamp(),
            action_type,
            origin_path,
            destination_path,
            lifetime_id,
            event_id: stamp.event_id,
            parent_id,
            size,
            server_id: stamp.server_id.clone(),
            content_id,
        }
    }

    /// A file appeared at `path`.
    pub fn created(
        stamp: &EventStamp,
        id: FileId,
        path: PortablePath,
        parent_id: Option<FileId>,
        size: i64,
        content_id: Option<String>,
    ) -> Self {
        Self::stamped(
            stamp,
            FileActionType::Create,
            id,
            None,
            Some(path),
            parent_id,
            size,
            content_id,
        )
    }

    /// A file moved from `from` to `to` under `parent_id`.
    pub fn moved(
        stamp: &EventStamp,
        id: FileId,
        from: PortablePath,
        to: PortablePath,
        parent_id: Option<FileId>,
        size: i64,
        content_id: Option<String>,
    ) -> Self {
        Self::stamped(
            stamp,
            FileActionType::Move,
            id,
            Some(from),
            Some(to),
            parent_id,
            size,
            content_id,
        )
    }

    /// A file at `path` now measures `size` bytes.
    pub fn resized(
        stamp: &EventStamp,
        id: FileId,
        path: PortablePath,
        parent_id: Option<FileId>,
        size: i64,
        content_id: Option<String>,
    ) -> Self {
        Self::stamped(
            stamp,
            FileActionType::SizeChange,
            id,
            Some(path.clone()),
            Some(path),
            parent_id,
            size,
            content_id,
        )
    }

    /// The file at `path` is gone.
    pub fn deleted(
        stamp: &EventStamp,
        id: FileId,
        path: PortablePath,
        parent_id: Option<FileId>,
        size: i64,
        content_id: Option<String>,
    ) -> Self {
        Self::stamped(
            stamp,
            FileActionType::Delete,
            id,
            Some(path),
            None,
            parent_id,
            size,
            content_id,
        )
    }

    /// The origin for deletions, the destination for everything else.
    pub fn relevant_path(&self) -> Option<&PortablePath> {
        match self.action_type {
            FileActionType::Delete => self.origin_path.as_ref(),
            _ => self.destination_path.as_ref(),
        }
    }

    /// Whether the action touches `path` or one of its direct children.
    pub fn touches_path(&self, path: &PortablePath) -> bool {
        [self.origin_path.as_ref(), self.destination_path.as_ref()]
            .into_iter()
            .flatten()
            .any(|p| p == path || p.is_direct_child_of(path))
    }

    /// Check the fields required by the action type are present.
    pub fn validate(&self) -> AppResult<()> {
        let ok = match self.action_type {
            FileActionType::Create | FileActionType::Restore => self.destination_path.is_some(),
            FileActionType::Move | FileActionType::SizeChange | FileActionType::Backup => {
                self.origin_path.is_some() && self.destination_path.is_some()
            }
            FileActionType::Delete => self.origin_path.is_some() && self.destination_path.is_none(),
        };
        if ok {
            Ok(())
        } else {
            Err(AppError::validation(format!(
                "{} action for {} is missing a path",
                self.action_type, self.lifetime_id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp() -> EventStamp {
        EventStamp {
            event_id: FileEventId::new(),
            server_id: "local".to_string(),
        }
    }

    #[test]
    fn test_relevant_path() {
        let stamp = stamp();
        let id = FileId::new();
        let a = PortablePath::parse("USERS:a.txt").unwrap();
        let b = PortablePath::parse("USERS:b.txt").unwrap();

        let create = FileAction::created(&stamp, id, a.clone(), None, 3, None);
        assert_eq!(create.relevant_path(), Some(&a));

        let mv = FileAction::moved(&stamp, id, a.clone(), b.clone(), None, 3, None);
        assert_eq!(mv.relevant_path(), Some(&b));

        let delete = FileAction::deleted(&stamp, id, b.clone(), None, 3, None);
        assert_eq!(delete.relevant_path(), Some(&b));
        assert!(delete.destination_path.is_none());
    }

    #[test]
    fn test_touches_path_matches_direct_children_only() {
        let stamp = stamp();
        let dir = PortablePath::parse("USERS:a/").unwrap();
        let child = PortablePath::parse("USERS:a/f.txt").unwrap();
        let nested = PortablePath::parse("USERS:a/b/f.txt").unwrap();

        let action = FileAction::created(&stamp, FileId::new(), child, None, 0, None);
        assert!(action.touches_path(&dir));
        let action = FileAction::created(&stamp, FileId::new(), nested, None, 0, None);
        assert!(!action.touches_path(&dir));
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let stamps: Vec<_> = (0..100).map(|_| action_timestamp()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(stamps[0].timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn test_action_type_parse() {
        for ty in [
            FileActionType::Create,
            FileActionType::Move,
            FileActionType::SizeChange,
            FileActionType::Delete,
            FileActionType::Restore,
            FileActionType::Backup,
        ] {
            assert_eq!(ty.as_str().parse::<FileActionType>().unwrap(), ty);
        }
        assert!("rename".parse::<FileActionType>().is_err());
    }
}
