//! In-memory lifetime store using `dashmap`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use filehub_core::result::AppResult;
use filehub_core::types::FileId;
use filehub_entity::{FileAction, Lifetime, PortablePath};

use crate::store::LifetimeStore;

/// Lifetime store that keeps everything in process memory.
///
/// Used for tests and for mirror trees that never need durable history.
#[derive(Debug, Clone, Default)]
pub struct MemoryLifetimeStore {
    lifetimes: Arc<DashMap<FileId, Lifetime>>,
}

impl MemoryLifetimeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored lifetimes across all servers.
    pub fn len(&self) -> usize {
        self.lifetimes.len()
    }

    /// Whether the store holds no lifetimes.
    pub fn is_empty(&self) -> bool {
        self.lifetimes.is_empty()
    }

    fn for_server(&self, server_id: &str) -> Vec<Lifetime> {
        self.lifetimes
            .iter()
            .filter(|entry| entry.server_id == server_id)
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[async_trait]
impl LifetimeStore for MemoryLifetimeStore {
    async fn upsert_lifetime(&self, lifetime: &Lifetime) -> AppResult<()> {
        self.lifetimes.insert(lifetime.id, lifetime.clone());
        Ok(())
    }

    async fn upsert_lifetimes(&self, lifetimes: &[Lifetime]) -> AppResult<()> {
        for lifetime in lifetimes {
            self.lifetimes.insert(lifetime.id, lifetime.clone());
        }
        Ok(())
    }

    async fn get_lifetime(&self, id: FileId) -> AppResult<Option<Lifetime>> {
        Ok(self.lifetimes.get(&id).map(|entry| entry.value().clone()))
    }

    async fn get_all_lifetimes(&self, server_id: &str) -> AppResult<Vec<Lifetime>> {
        let mut lifetimes = self.for_server(server_id);
        lifetimes.sort_by_key(Lifetime::updated_at);
        Ok(lifetimes)
    }

    async fn get_lifetimes_since(
        &self,
        server_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Lifetime>> {
        let mut lifetimes: Vec<Lifetime> = self
            .for_server(server_id)
            .into_iter()
            .filter(|l| l.updated_at().is_some_and(|t| t > since))
            .collect();
        lifetimes.sort_by_key(Lifetime::updated_at);
        Ok(lifetimes)
    }

    async fn get_actions_by_path(
        &self,
        server_id: &str,
        path: &PortablePath,
    ) -> AppResult<Vec<FileAction>> {
        let mut actions: Vec<FileAction> = self
            .lifetimes
            .iter()
            .flat_map(|entry| entry.value().actions.clone())
            .filter(|a| a.server_id == server_id && a.touches_path(path))
            .collect();
        actions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(actions)
    }

    async fn get_latest_action(&self, server_id: &str) -> AppResult<Option<FileAction>> {
        Ok(self
            .lifetimes
            .iter()
            .filter_map(|entry| {
                entry
                    .value()
                    .actions
                    .iter()
                    .filter(|a| a.server_id == server_id)
                    .max_by_key(|a| a.timestamp)
                    .cloned()
            })
            .max_by_key(|a| a.timestamp))
    }
}
