//! The ordered history of one file identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use filehub_core::types::FileId;
use filehub_core::{AppError, AppResult, ErrorCode};

use super::action::FileAction;
use crate::path::PortablePath;

/// Every action ever recorded for one file, oldest first.
///
/// A lifetime opens with a Create (or Restore) action and is closed for
/// good by a Delete. Closed lifetimes are kept as tombstones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifetime {
    /// Lifetime id, equal to the file identity.
    pub id: FileId,
    /// The identity of the live file, `None` once deleted.
    pub live_id: Option<FileId>,
    /// Most recent known content id.
    pub content_id: Option<String>,
    /// Whether the file is a directory.
    pub is_dir: bool,
    /// Actions in chronological order.
    pub actions: Vec<FileAction>,
    /// Server that owns this history.
    pub server_id: String,
}

impl Lifetime {
    /// Open a lifetime from its first action.
    pub fn new(first: FileAction) -> AppResult<Self> {
        if !first.action_type.is_creation() {
            return Err(AppError::coded(
                ErrorCode::InvalidLifetime,
                format!(
                    "Lifetime {} must begin with a create action, got {}",
                    first.lifetime_id, first.action_type
                ),
            ));
        }
        first.validate()?;

        let is_dir = first
            .destination_path
            .as_ref()
            .is_some_and(PortablePath::is_dir);
        Ok(Self {
            id: first.lifetime_id,
            live_id: Some(first.lifetime_id),
            content_id: first.content_id.clone(),
            is_dir,
            server_id: first.server_id.clone(),
            actions: vec![first],
        })
    }

    /// Append the next action.
    pub fn add(&mut self, action: FileAction) -> AppResult<()> {
        if action.lifetime_id != self.id {
            return Err(AppError::coded(
                ErrorCode::InvalidLifetime,
                format!(
                    "Action for {} appended to lifetime {}",
                    action.lifetime_id, self.id
                ),
            ));
        }
        if action.action_type.is_creation() {
            return Err(AppError::coded(
                ErrorCode::LifetimeExists,
                format!("Lifetime {} already exists", self.id),
            ));
        }
        if !self.is_live() {
            return Err(AppError::coded(
                ErrorCode::LifetimeClosed,
                format!("Lifetime {} has been deleted", self.id),
            ));
        }
        action.validate()?;

        self.live_id = action.destination_path.as_ref().map(|_| self.id);
        if action.content_id.is_some() {
            self.content_id = action.content_id.clone();
        }
        self.actions.push(action);
        Ok(())
    }

    /// Check the invariants of a lifetime received from elsewhere.
    pub fn validate(&self) -> AppResult<()> {
        let mut rebuilt = match self.actions.first() {
            Some(first) if first.lifetime_id == self.id => Self::new(first.clone())?,
            _ => {
                return Err(AppError::coded(
                    ErrorCode::InvalidLifetime,
                    format!("Lifetime {} has no opening action", self.id),
                ));
            }
        };
        for action in self.actions.iter().skip(1) {
            rebuilt.add(action.clone())?;
        }
        if rebuilt.live_id != self.live_id {
            return Err(AppError::coded(
                ErrorCode::InvalidLifetime,
                format!("Lifetime {} live state disagrees with its actions", self.id),
            ));
        }
        Ok(())
    }

    /// Whether the file still exists according to its latest action.
    pub fn is_live(&self) -> bool {
        self.latest_action()
            .is_some_and(|a| a.destination_path.is_some())
    }

    /// The most recent action.
    pub fn latest_action(&self) -> Option<&FileAction> {
        self.actions.last()
    }

    /// The current location, if the file is live.
    pub fn latest_path(&self) -> Option<&PortablePath> {
        self.latest_action().and_then(|a| a.destination_path.as_ref())
    }

    /// The last recorded size.
    pub fn latest_size(&self) -> i64 {
        self.latest_action().map_or(-1, |a| a.size)
    }

    /// The last action strictly before `time`.
    pub fn action_before(&self, time: DateTime<Utc>) -> Option<&FileAction> {
        self.actions.iter().rev().find(|a| a.timestamp < time)
    }

    /// Timestamp of the latest action.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.latest_action().map(|a| a.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::action::EventStamp;
    use filehub_core::types::FileEventId;

    fn stamp() -> EventStamp {
        EventStamp {
            event_id: FileEventId::new(),
            server_id: "local".to_string(),
        }
    }

    fn path(s: &str) -> PortablePath {
        PortablePath::parse(s).unwrap()
    }

    #[test]
    fn test_new_requires_create() {
        let stamp = stamp();
        let id = FileId::new();
        let lifetime =
            Lifetime::new(FileAction::created(&stamp, id, path("USERS:a/"), None, -1, None))
                .unwrap();
        assert!(lifetime.is_live());
        assert!(lifetime.is_dir);
        assert_eq!(lifetime.live_id, Some(id));

        let err = Lifetime::new(FileAction::deleted(&stamp, id, path("USERS:a/"), None, 0, None))
            .unwrap_err();
        assert!(err.is(ErrorCode::InvalidLifetime));
    }

    #[test]
    fn test_delete_closes_lifetime() {
        let stamp = stamp();
        let id = FileId::new();
        let mut lifetime = Lifetime::new(FileAction::created(
            &stamp,
            id,
            path("USERS:f.txt"),
            None,
            3,
            Some("abc".to_string()),
        ))
        .unwrap();

        lifetime
            .add(FileAction::moved(
                &stamp,
                id,
                path("USERS:f.txt"),
                path("USERS:g.txt"),
                None,
                3,
                None,
            ))
            .unwrap();
        assert_eq!(lifetime.latest_path(), Some(&path("USERS:g.txt")));
        assert_eq!(lifetime.content_id.as_deref(), Some("abc"));

        lifetime
            .add(FileAction::deleted(&stamp, id, path("USERS:g.txt"), None, 3, None))
            .unwrap();
        assert!(!lifetime.is_live());
        assert_eq!(lifetime.live_id, None);

        let err = lifetime
            .add(FileAction::resized(&stamp, id, path("USERS:g.txt"), None, 4, None))
            .unwrap_err();
        assert!(err.is(ErrorCode::LifetimeClosed));
        assert_eq!(lifetime.actions.len(), 3);
        lifetime.validate().unwrap();
    }

    #[test]
    fn test_second_create_is_rejected() {
        let stamp = stamp();
        let id = FileId::new();
        let mut lifetime =
            Lifetime::new(FileAction::created(&stamp, id, path("USERS:f"), None, 0, None))
                .unwrap();
        let err = lifetime
            .add(FileAction::created(&stamp, id, path("USERS:f"), None, 0, None))
            .unwrap_err();
        assert!(err.is(ErrorCode::LifetimeExists));
    }

    #[test]
    fn test_action_before() {
        let stamp = stamp();
        let id = FileId::new();
        let mut lifetime =
            Lifetime::new(FileAction::created(&stamp, id, path("USERS:f"), None, 0, None))
                .unwrap();
        let mut resize = FileAction::resized(&stamp, id, path("USERS:f"), None, 10, None);
        resize.timestamp = lifetime.actions[0].timestamp + chrono::Duration::seconds(5);
        lifetime.add(resize.clone()).unwrap();

        let cutoff = lifetime.actions[0].timestamp + chrono::Duration::seconds(1);
        assert_eq!(lifetime.action_before(cutoff).map(|a| a.size), Some(0));
        assert_eq!(lifetime.action_before(resize.timestamp), Some(&lifetime.actions[0]));
        assert_eq!(
            lifetime.action_before(resize.timestamp + chrono::Duration::seconds(1)),
            Some(&resize)
        );
    }
}
