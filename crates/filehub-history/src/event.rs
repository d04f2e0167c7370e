//! Batches of actions that are journaled together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use filehub_core::error::{AppError, ErrorCode};
use filehub_core::result::AppResult;
use filehub_core::types::{FileEventId, FileId};
use filehub_entity::{EventStamp, FileAction};

/// Where an event is in its journaling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStatus {
    /// Built or queued, not processed yet.
    Pending,
    /// Merged into the lifetime map and persisted, or had nothing to log.
    Logged,
    /// Rejected by the worker or not persisted.
    Failed(String),
}

/// One logical operation's worth of file actions.
///
/// Actions may be appended concurrently until the event is handed to the
/// journal. Completion is observable through [`FileEvent::wait`].
#[derive(Debug)]
pub struct FileEvent {
    id: FileEventId,
    server_id: String,
    begin: DateTime<Utc>,
    actions: Mutex<Vec<FileAction>>,
    status: watch::Sender<EventStatus>,
    submitted: AtomicBool,
}

impl FileEvent {
    /// Create an empty event for `server_id`.
    pub fn new(server_id: impl Into<String>) -> Self {
        let (status, _) = watch::channel(EventStatus::Pending);
        Self {
            id: FileEventId::new(),
            server_id: server_id.into(),
            begin: Utc::now(),
            actions: Mutex::new(Vec::new()),
            status,
            submitted: AtomicBool::new(false),
        }
    }

    /// Event identity.
    pub fn id(&self) -> FileEventId {
        self.id
    }

    /// Server the event belongs to.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// When the event was created.
    pub fn begin(&self) -> DateTime<Utc> {
        self.begin
    }

    /// Membership stamp for new actions.
    pub fn stamp(&self) -> EventStamp {
        EventStamp {
            event_id: self.id,
            server_id: self.server_id.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<FileAction>> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one action.
    pub fn append(&self, action: FileAction) {
        if self.submitted.load(Ordering::Acquire) {
            tracing::warn!(
                event_id = %self.id,
                file_id = %action.lifetime_id,
                "Action appended to an event that was already submitted"
            );
        }
        self.lock().push(action);
    }

    /// Append several actions, keeping their order.
    pub fn extend(&self, actions: impl IntoIterator<Item = FileAction>) {
        let mut guard = self.lock();
        guard.extend(actions);
    }

    /// A copy of the actions appended so far.
    pub fn actions(&self) -> Vec<FileAction> {
        self.lock().clone()
    }

    /// Number of actions appended so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no action has been appended.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Size recorded by the latest action for `id` in this event.
    pub fn latest_size_for(&self, id: FileId) -> Option<i64> {
        self.lock()
            .iter()
            .rev()
            .find(|a| a.lifetime_id == id)
            .map(|a| a.size)
    }

    /// Current journaling status.
    pub fn status(&self) -> EventStatus {
        self.status.borrow().clone()
    }

    /// Marks the event as handed to the journal. Returns `false` if it
    /// already was.
    pub(crate) fn mark_submitted(&self) -> bool {
        !self.submitted.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn complete(&self, status: EventStatus) {
        self.status.send_replace(status);
    }

    /// Resolve once the journal has processed this event.
    pub async fn wait(&self) -> AppResult<()> {
        let mut rx = self.status.subscribe();
        let status = rx
            .wait_for(|s| *s != EventStatus::Pending)
            .await
            .map_err(|_| AppError::coded(ErrorCode::JournalClosed, "Event status dropped"))?
            .clone();
        match status {
            EventStatus::Failed(reason) => Err(AppError::coded(
                ErrorCode::EventFailed,
                format!("Event {} failed: {reason}", self.id),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filehub_entity::PortablePath;
    use std::sync::Arc;

    #[test]
    fn test_latest_size_for() {
        let event = FileEvent::new("local");
        let id = FileId::new();
        let path = PortablePath::parse("USERS:f").unwrap();
        let stamp = event.stamp();
        event.append(FileAction::created(&stamp, id, path.clone(), None, 1, None));
        event.append(FileAction::resized(&stamp, id, path, None, 7, None));

        assert_eq!(event.len(), 2);
        assert_eq!(event.latest_size_for(id), Some(7));
        assert_eq!(event.latest_size_for(FileId::new()), None);
        assert!(event.actions().iter().all(|a| a.event_id == event.id()));
    }

    #[tokio::test]
    async fn test_wait_resolves_on_completion() {
        let event = Arc::new(FileEvent::new("local"));
        let waiter = {
            let event = Arc::clone(&event);
            tokio::spawn(async move { event.wait().await })
        };
        tokio::task::yield_now().await;
        event.complete(EventStatus::Logged);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_wait_reports_failure() {
        let event = FileEvent::new("local");
        event.complete(EventStatus::Failed("boom".to_string()));
        let err = event.wait().await.unwrap_err();
        assert!(err.is(ErrorCode::EventFailed));
    }
}
