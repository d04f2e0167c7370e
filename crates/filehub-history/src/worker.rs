//! The single consumer that merges events into lifetimes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace};

use filehub_core::error::{AppError, ErrorCode};
use filehub_core::result::AppResult;
use filehub_core::types::FileId;
use filehub_database::LifetimeStore;
use filehub_entity::{FileAction, Lifetime};

use crate::event::{EventStatus, FileEvent};
use crate::journal::{read_map, write_map};

pub(crate) type LifetimeMap = Arc<RwLock<HashMap<FileId, Lifetime>>>;

/// Messages accepted by the worker, processed strictly in queue order.
pub(crate) enum JournalMessage {
    /// Merge and persist an event.
    Event(Arc<FileEvent>),
    /// Reply once everything queued before it has been processed.
    Flush(oneshot::Sender<()>),
    /// Replace lifetimes with externally recorded copies.
    Import(Vec<Lifetime>, oneshot::Sender<AppResult<()>>),
}

pub(crate) struct EventWorker {
    server_id: String,
    lifetimes: LifetimeMap,
    store: Arc<dyn LifetimeStore>,
    rx: mpsc::Receiver<JournalMessage>,
}

impl EventWorker {
    pub(crate) fn new(
        server_id: String,
        lifetimes: LifetimeMap,
        store: Arc<dyn LifetimeStore>,
        rx: mpsc::Receiver<JournalMessage>,
    ) -> Self {
        Self {
            server_id,
            lifetimes,
            store,
            rx,
        }
    }

    pub(crate) async fn run(mut self) {
        debug!(server_id = %self.server_id, "Journal worker started");
        while let Some(message) = self.rx.recv().await {
            match message {
                JournalMessage::Event(event) => self.handle_event(&event).await,
                JournalMessage::Flush(reply) => {
                    let _ = reply.send(());
                }
                JournalMessage::Import(lifetimes, reply) => {
                    let _ = reply.send(self.import(lifetimes).await);
                }
            }
        }
        debug!(server_id = %self.server_id, "Journal worker stopped");
    }

    async fn handle_event(&self, event: &FileEvent) {
        let mut actions = event.actions();
        actions.sort_by_key(|a| a.timestamp);

        let touched = match self.stage(&actions) {
            Ok(touched) => touched,
            Err(e) => {
                error!(
                    event_id = %event.id(),
                    actions = actions.len(),
                    error = %e,
                    "Rejected file event"
                );
                event.complete(EventStatus::Failed(e.message));
                return;
            }
        };

        {
            let mut map = write_map(&self.lifetimes);
            for lifetime in &touched {
                map.insert(lifetime.id, lifetime.clone());
            }
        }

        match self.store.upsert_lifetimes(&touched).await {
            Ok(()) => {
                trace!(
                    event_id = %event.id(),
                    actions = actions.len(),
                    lifetimes = touched.len(),
                    "Logged file event"
                );
                event.complete(EventStatus::Logged);
            }
            Err(e) => {
                error!(event_id = %event.id(), error = %e, "Failed to persist file event");
                event.complete(EventStatus::Failed(e.message));
            }
        }
    }

    /// Apply `actions` to copies of the affected lifetimes. Nothing is
    /// visible in the map unless every action merged.
    fn stage(&self, actions: &[FileAction]) -> AppResult<Vec<Lifetime>> {
        let map = read_map(&self.lifetimes);
        let mut staged: HashMap<FileId, Lifetime> = HashMap::new();
        let mut order: Vec<FileId> = Vec::new();

        for action in actions {
            let id = action.lifetime_id;
            if action.action_type.is_creation() {
                if staged.contains_key(&id) || map.contains_key(&id) {
                    return Err(AppError::coded(
                        ErrorCode::LifetimeExists,
                        format!("Lifetime {id} already exists"),
                    ));
                }
                staged.insert(id, Lifetime::new(action.clone())?);
                order.push(id);
                continue;
            }

            if !staged.contains_key(&id) {
                let existing = map.get(&id).cloned().ok_or_else(|| {
                    AppError::coded(
                        ErrorCode::LifetimeNotFound,
                        format!("No lifetime for {} action on {id}", action.action_type),
                    )
                })?;
                staged.insert(id, existing);
                order.push(id);
            }
            if let Some(lifetime) = staged.get_mut(&id) {
                lifetime.add(action.clone())?;
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|id| staged.remove(&id))
            .collect())
    }

    async fn import(&self, lifetimes: Vec<Lifetime>) -> AppResult<()> {
        for lifetime in &lifetimes {
            if lifetime.server_id != self.server_id {
                return Err(AppError::coded(
                    ErrorCode::ServerMismatch,
                    format!(
                        "Lifetime {} belongs to server '{}', not '{}'",
                        lifetime.id, lifetime.server_id, self.server_id
                    ),
                ));
            }
            lifetime.validate()?;
        }

        {
            let mut map = write_map(&self.lifetimes);
            for lifetime in &lifetimes {
                map.insert(lifetime.id, lifetime.clone());
            }
        }
        self.store.upsert_lifetimes(&lifetimes).await?;
        debug!(count = lifetimes.len(), "Imported lifetimes");
        Ok(())
    }
}
