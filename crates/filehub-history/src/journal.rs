//! The history journal.
//!
//! A [`Journal`] owns the lifetime map and a bounded queue feeding one
//! worker task. The worker is the only writer of the map; the query
//! methods read it directly, or go to the backing store for range queries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use filehub_core::config::JournalConfig;
use filehub_core::error::{AppError, ErrorCode};
use filehub_core::result::AppResult;
use filehub_core::types::FileId;
use filehub_database::LifetimeStore;
use filehub_entity::{FileAction, Lifetime, PastFile, PortablePath};

use crate::event::{EventStatus, FileEvent};
use crate::query;
use crate::worker::{EventWorker, JournalMessage, LifetimeMap};

/// Handle to a running journal. Cloning shares the same journal.
#[derive(Debug, Clone)]
pub struct Journal {
    inner: Arc<JournalInner>,
}

struct JournalInner {
    server_id: String,
    ignore_local: bool,
    sender: Mutex<Option<mpsc::Sender<JournalMessage>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    lifetimes: LifetimeMap,
    store: Arc<dyn LifetimeStore>,
}

impl std::fmt::Debug for JournalInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalInner")
            .field("server_id", &self.server_id)
            .field("ignore_local", &self.ignore_local)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

pub(crate) fn read_map(map: &LifetimeMap) -> RwLockReadGuard<'_, HashMap<FileId, Lifetime>> {
    map.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_map(map: &LifetimeMap) -> RwLockWriteGuard<'_, HashMap<FileId, Lifetime>> {
    map.write().unwrap_or_else(PoisonError::into_inner)
}

impl Journal {
    /// Load this server's lifetimes from `store` and start the worker.
    pub async fn start(config: &JournalConfig, store: Arc<dyn LifetimeStore>) -> AppResult<Self> {
        let existing = store.get_all_lifetimes(&config.server_id).await?;
        let live = existing.iter().filter(|l| l.is_live()).count();
        info!(
            server_id = %config.server_id,
            lifetimes = existing.len(),
            live,
            ignore_local = config.ignore_local,
            "Loaded file history"
        );

        let lifetimes: LifetimeMap = Arc::new(RwLock::new(
            existing.into_iter().map(|l| (l.id, l)).collect(),
        ));

        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let worker = EventWorker::new(
            config.server_id.clone(),
            Arc::clone(&lifetimes),
            Arc::clone(&store),
            rx,
        );
        let handle = tokio::spawn(worker.run());

        Ok(Self {
            inner: Arc::new(JournalInner {
                server_id: config.server_id.clone(),
                ignore_local: config.ignore_local,
                sender: Mutex::new(Some(tx)),
                worker: tokio::sync::Mutex::new(Some(handle)),
                lifetimes,
                store,
            }),
        })
    }

    /// Identity stamped on this journal's events.
    pub fn server_id(&self) -> &str {
        &self.inner.server_id
    }

    /// Whether locally observed changes are dropped instead of journaled.
    pub fn ignore_local(&self) -> bool {
        self.inner.ignore_local
    }

    /// A fresh, empty event for this server.
    pub fn new_event(&self) -> Arc<FileEvent> {
        Arc::new(FileEvent::new(self.inner.server_id.clone()))
    }

    fn sender(&self) -> AppResult<mpsc::Sender<JournalMessage>> {
        self.inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| AppError::coded(ErrorCode::JournalClosed, "Journal is closed"))
    }

    /// Queue a completed event. Waits only while the queue is full.
    ///
    /// Events without actions, and every event on a journal that ignores
    /// local changes, complete immediately without reaching the worker.
    pub async fn log_event(&self, event: Arc<FileEvent>) -> AppResult<()> {
        if !event.mark_submitted() {
            warn!(event_id = %event.id(), "File event submitted twice");
            return Ok(());
        }
        if event.is_empty() {
            trace!(event_id = %event.id(), "Skipping empty file event");
            event.complete(EventStatus::Logged);
            return Ok(());
        }
        if self.inner.ignore_local {
            debug!(
                event_id = %event.id(),
                actions = event.len(),
                "Ignoring local file event"
            );
            event.complete(EventStatus::Logged);
            return Ok(());
        }

        let sender = self.sender().inspect_err(|_| {
            event.complete(EventStatus::Failed("journal closed".to_string()));
        })?;
        let event_id = event.id();
        sender
            .send(JournalMessage::Event(event))
            .await
            .map_err(|failed| {
                if let JournalMessage::Event(event) = failed.0 {
                    event.complete(EventStatus::Failed("journal closed".to_string()));
                }
                AppError::coded(
                    ErrorCode::JournalClosed,
                    format!("Journal closed before event {event_id} was queued"),
                )
            })
    }

    /// Log `event` and wait for the worker to process it.
    pub async fn log_and_wait(&self, event: Arc<FileEvent>) -> AppResult<()> {
        self.log_event(Arc::clone(&event)).await?;
        event.wait().await
    }

    /// Resolve after every event queued before this call is processed.
    pub async fn flush(&self) -> AppResult<()> {
        let (tx, rx) = oneshot::channel();
        self.sender()?
            .send(JournalMessage::Flush(tx))
            .await
            .map_err(|_| AppError::coded(ErrorCode::JournalClosed, "Journal is closed"))?;
        rx.await
            .map_err(|_| AppError::coded(ErrorCode::JournalClosed, "Journal worker stopped"))
    }

    /// Stop accepting events, drain the queue, and join the worker.
    pub async fn close(&self) -> AppResult<()> {
        let sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        let handle = self.inner.worker.lock().await.take();
        if let Some(handle) = handle {
            handle.await.map_err(|e| {
                AppError::internal(format!("Journal worker terminated abnormally: {e}"))
            })?;
            info!(server_id = %self.inner.server_id, "Journal closed");
        }
        Ok(())
    }

    /// Merge lifetimes recorded elsewhere (a backup restore, say) through
    /// the worker. Fails without changes if any belongs to another server
    /// or breaks lifetime invariants.
    pub async fn import_lifetimes(&self, lifetimes: Vec<Lifetime>) -> AppResult<()> {
        let (tx, rx) = oneshot::channel();
        self.sender()?
            .send(JournalMessage::Import(lifetimes, tx))
            .await
            .map_err(|_| AppError::coded(ErrorCode::JournalClosed, "Journal is closed"))?;
        rx.await
            .map_err(|_| AppError::coded(ErrorCode::JournalClosed, "Journal worker stopped"))?
    }

    /// One lifetime by id.
    pub fn get(&self, id: FileId) -> Option<Lifetime> {
        read_map(&self.inner.lifetimes).get(&id).cloned()
    }

    /// Lifetimes whose file still exists.
    pub fn get_active_lifetimes(&self) -> Vec<Lifetime> {
        read_map(&self.inner.lifetimes)
            .values()
            .filter(|l| l.is_live())
            .cloned()
            .collect()
    }

    /// Every known lifetime, including tombstones.
    pub fn get_all_lifetimes(&self) -> Vec<Lifetime> {
        read_map(&self.inner.lifetimes).values().cloned().collect()
    }

    /// The children of `folder_id` as they were just before `time`.
    pub fn get_past_folder_children(
        &self,
        folder_id: FileId,
        time: DateTime<Utc>,
    ) -> Vec<PastFile> {
        let map = read_map(&self.inner.lifetimes);
        query::past_children(map.values(), folder_id, time)
    }

    /// The state of one file just before `time`, or `None` if it did not
    /// exist then.
    pub fn get_past_file(&self, id: FileId, time: DateTime<Utc>) -> AppResult<Option<PastFile>> {
        let map = read_map(&self.inner.lifetimes);
        let lifetime = map.get(&id).ok_or_else(|| {
            AppError::coded(ErrorCode::LifetimeNotFound, format!("No lifetime for {id}"))
        })?;
        Ok(lifetime.action_before(time).and_then(PastFile::from_action))
    }

    /// Every action after `time`, oldest first, for replaying elsewhere.
    pub fn get_actions_since(&self, time: DateTime<Utc>) -> Vec<FileAction> {
        let map = read_map(&self.inner.lifetimes);
        query::actions_since(map.values(), time)
    }

    /// Persisted actions at `path` or its direct children, newest first.
    pub async fn get_actions_by_path(&self, path: &PortablePath) -> AppResult<Vec<FileAction>> {
        self.inner
            .store
            .get_actions_by_path(&self.inner.server_id, path)
            .await
    }

    /// Persisted lifetimes updated after `since`.
    pub async fn get_lifetimes_since(&self, since: DateTime<Utc>) -> AppResult<Vec<Lifetime>> {
        self.inner
            .store
            .get_lifetimes_since(&self.inner.server_id, since)
            .await
    }

    /// The newest persisted action of this server.
    pub async fn get_latest_action(&self) -> AppResult<Option<FileAction>> {
        self.inner
            .store
            .get_latest_action(&self.inner.server_id)
            .await
    }
}
