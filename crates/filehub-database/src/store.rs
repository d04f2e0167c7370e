//! The persistent lifetime store consumed by the journal.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use filehub_core::result::AppResult;
use filehub_core::types::FileId;
use filehub_entity::{FileAction, Lifetime, PortablePath};

/// Durable home of lifetimes and their actions.
///
/// Writes are upserts keyed by lifetime id, so re-applying the same
/// lifetime state is idempotent. Queries are scoped to one server's
/// history.
#[async_trait]
pub trait LifetimeStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert or replace one lifetime together with all of its actions.
    async fn upsert_lifetime(&self, lifetime: &Lifetime) -> AppResult<()>;

    /// Insert or replace several lifetimes in one unit of work.
    async fn upsert_lifetimes(&self, lifetimes: &[Lifetime]) -> AppResult<()>;

    /// Fetch one lifetime by id.
    async fn get_lifetime(&self, id: FileId) -> AppResult<Option<Lifetime>>;

    /// Every lifetime recorded by `server_id`, live or not.
    async fn get_all_lifetimes(&self, server_id: &str) -> AppResult<Vec<Lifetime>>;

    /// Lifetimes whose latest action is strictly after `since`, oldest update first.
    async fn get_lifetimes_since(
        &self,
        server_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Lifetime>>;

    /// Actions at `path` or at one of its direct children, newest first.
    async fn get_actions_by_path(
        &self,
        server_id: &str,
        path: &PortablePath,
    ) -> AppResult<Vec<FileAction>>;

    /// The newest action recorded by `server_id`.
    async fn get_latest_action(&self, server_id: &str) -> AppResult<Option<FileAction>>;
}
