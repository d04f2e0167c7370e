//! SQLite lifetime repository.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use filehub_core::error::{AppError, ErrorCode, ErrorKind};
use filehub_core::result::AppResult;
use filehub_core::types::{FileEventId, FileId};
use filehub_entity::{FileAction, FileActionType, Lifetime, PortablePath};

use crate::store::LifetimeStore;

/// Fixed-width UTC timestamps; lexicographic order equals time order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Lifetime store backed by the `lifetimes` and `file_actions` tables.
#[derive(Debug, Clone)]
pub struct SqliteLifetimeStore {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct LifetimeRow {
    id: String,
    server_id: String,
    live_id: Option<String>,
    content_id: Option<String>,
    is_dir: bool,
}

#[derive(Debug, FromRow)]
struct ActionRow {
    lifetime_id: String,
    timestamp: String,
    action_type: String,
    origin_path: Option<String>,
    destination_path: Option<String>,
    parent_id: Option<String>,
    event_id: String,
    size: i64,
    server_id: String,
    content_id: Option<String>,
}

impl SqliteLifetimeStore {
    /// Create a new lifetime repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn assemble(rows: Vec<LifetimeRow>, actions: Vec<ActionRow>) -> AppResult<Vec<Lifetime>> {
        let mut grouped: HashMap<String, Vec<FileAction>> = HashMap::new();
        for row in actions {
            let key = row.lifetime_id.clone();
            grouped.entry(key).or_default().push(row.into_action()?);
        }

        rows.into_iter()
            .map(|row| {
                let actions = grouped.remove(&row.id).unwrap_or_default();
                row.into_lifetime(actions)
            })
            .collect()
    }
}

#[async_trait]
impl LifetimeStore for SqliteLifetimeStore {
    async fn upsert_lifetime(&self, lifetime: &Lifetime) -> AppResult<()> {
        self.upsert_lifetimes(std::slice::from_ref(lifetime)).await
    }

    async fn upsert_lifetimes(&self, lifetimes: &[Lifetime]) -> AppResult<()> {
        if lifetimes.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to begin upsert", e))?;

        for lifetime in lifetimes {
            let updated_at = lifetime.updated_at().ok_or_else(|| {
                AppError::coded(
                    ErrorCode::InvalidLifetime,
                    format!("Lifetime {} has no actions", lifetime.id),
                )
            })?;
            let id = lifetime.id.to_string();

            sqlx::query(
                "INSERT INTO lifetimes (id, server_id, live_id, content_id, is_dir, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT (id) DO UPDATE SET server_id = excluded.server_id, \
                 live_id = excluded.live_id, content_id = excluded.content_id, \
                 is_dir = excluded.is_dir, updated_at = excluded.updated_at",
            )
            .bind(&id)
            .bind(&lifetime.server_id)
            .bind(lifetime.live_id.map(|l| l.to_string()))
            .bind(&lifetime.content_id)
            .bind(lifetime.is_dir)
            .bind(format_timestamp(&updated_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to upsert lifetime", e))?;

            sqlx::query("DELETE FROM file_actions WHERE lifetime_id = ?1")
                .bind(&id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to clear lifetime actions", e)
                })?;

            for (seq, action) in lifetime.actions.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO file_actions (lifetime_id, seq, timestamp, action_type, \
                     origin_path, destination_path, origin_dir, destination_dir, parent_id, \
                     event_id, size, server_id, content_id) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                )
                .bind(&id)
                .bind(seq as i64)
                .bind(format_timestamp(&action.timestamp))
                .bind(action.action_type.as_str())
                .bind(action.origin_path.as_ref().map(ToString::to_string))
                .bind(action.destination_path.as_ref().map(ToString::to_string))
                .bind(action.origin_path.as_ref().map(|p| p.dir().to_string()))
                .bind(action.destination_path.as_ref().map(|p| p.dir().to_string()))
                .bind(action.parent_id.map(|p| p.to_string()))
                .bind(action.event_id.to_string())
                .bind(action.size)
                .bind(&action.server_id)
                .bind(&action.content_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to insert file action", e)
                })?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit upsert", e))
    }

    async fn get_lifetime(&self, id: FileId) -> AppResult<Option<Lifetime>> {
        let id = id.to_string();
        let Some(row) = sqlx::query_as::<_, LifetimeRow>("SELECT * FROM lifetimes WHERE id = ?1")
            .bind(&id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find lifetime", e))?
        else {
            return Ok(None);
        };

        let actions = sqlx::query_as::<_, ActionRow>(
            "SELECT * FROM file_actions WHERE lifetime_id = ?1 ORDER BY seq ASC",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load actions", e))?;

        Ok(Self::assemble(vec![row], actions)?.pop())
    }

    async fn get_all_lifetimes(&self, server_id: &str) -> AppResult<Vec<Lifetime>> {
        let rows = sqlx::query_as::<_, LifetimeRow>(
            "SELECT * FROM lifetimes WHERE server_id = ?1 ORDER BY updated_at ASC",
        )
        .bind(server_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list lifetimes", e))?;

        let actions = sqlx::query_as::<_, ActionRow>(
            "SELECT a.* FROM file_actions a JOIN lifetimes l ON l.id = a.lifetime_id \
             WHERE l.server_id = ?1 ORDER BY a.lifetime_id, a.seq ASC",
        )
        .bind(server_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load actions", e))?;

        Self::assemble(rows, actions)
    }

    async fn get_lifetimes_since(
        &self,
        server_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Lifetime>> {
        let since = format_timestamp(&since);
        let rows = sqlx::query_as::<_, LifetimeRow>(
            "SELECT * FROM lifetimes WHERE server_id = ?1 AND updated_at > ?2 \
             ORDER BY updated_at ASC",
        )
        .bind(server_id)
        .bind(&since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list recent lifetimes", e)
        })?;

        let actions = sqlx::query_as::<_, ActionRow>(
            "SELECT a.* FROM file_actions a JOIN lifetimes l ON l.id = a.lifetime_id \
             WHERE l.server_id = ?1 AND l.updated_at > ?2 ORDER BY a.lifetime_id, a.seq ASC",
        )
        .bind(server_id)
        .bind(&since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load actions", e))?;

        Self::assemble(rows, actions)
    }

    async fn get_actions_by_path(
        &self,
        server_id: &str,
        path: &PortablePath,
    ) -> AppResult<Vec<FileAction>> {
        let path = path.to_string();
        let rows = sqlx::query_as::<_, ActionRow>(
            "SELECT * FROM file_actions WHERE server_id = ?1 AND \
             (origin_path = ?2 OR destination_path = ?2 OR origin_dir = ?2 OR destination_dir = ?2) \
             ORDER BY timestamp DESC, seq DESC",
        )
        .bind(server_id)
        .bind(&path)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find actions by path", e)
        })?;

        rows.into_iter().map(ActionRow::into_action).collect()
    }

    async fn get_latest_action(&self, server_id: &str) -> AppResult<Option<FileAction>> {
        sqlx::query_as::<_, ActionRow>(
            "SELECT * FROM file_actions WHERE server_id = ?1 \
             ORDER BY timestamp DESC, seq DESC LIMIT 1",
        )
        .bind(server_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find latest action", e))?
        .map(ActionRow::into_action)
        .transpose()
    }
}

impl LifetimeRow {
    fn into_lifetime(self, actions: Vec<FileAction>) -> AppResult<Lifetime> {
        Ok(Lifetime {
            id: parse_id(&self.id, "lifetime id")?,
            live_id: self
                .live_id
                .as_deref()
                .map(|l| parse_id(l, "live id"))
                .transpose()?,
            content_id: self.content_id,
            is_dir: self.is_dir,
            actions,
            server_id: self.server_id,
        })
    }
}

impl ActionRow {
    fn into_action(self) -> AppResult<FileAction> {
        Ok(FileAction {
            timestamp: parse_timestamp(&self.timestamp)?,
            action_type: self
                .action_type
                .parse::<FileActionType>()
                .map_err(|e| corrupt("action type", e))?,
            origin_path: self.origin_path.as_deref().map(parse_path).transpose()?,
            destination_path: self.destination_path.as_deref().map(parse_path).transpose()?,
            lifetime_id: parse_id(&self.lifetime_id, "lifetime id")?,
            event_id: self
                .event_id
                .parse::<FileEventId>()
                .map_err(|e| corrupt("event id", e))?,
            parent_id: self
                .parent_id
                .as_deref()
                .map(|p| parse_id(p, "parent id"))
                .transpose()?,
            size: self.size,
            server_id: self.server_id,
            content_id: self.content_id,
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| corrupt("timestamp", e))
}

fn parse_id(raw: &str, field: &str) -> AppResult<FileId> {
    raw.parse::<FileId>().map_err(|e| corrupt(field, e))
}

fn parse_path(raw: &str) -> AppResult<PortablePath> {
    PortablePath::parse(raw).map_err(|e| corrupt("portable path", e))
}

fn corrupt(field: &str, err: impl std::error::Error + Send + Sync + 'static) -> AppError {
    AppError::with_source(
        ErrorKind::Database,
        format!("Corrupt {field} in history store"),
        err,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DatabasePool;
    use crate::migration::run_migrations;
    use chrono::Duration;
    use filehub_entity::EventStamp;

    async fn store() -> SqliteLifetimeStore {
        let db = DatabasePool::in_memory().await.unwrap();
        run_migrations(db.pool()).await.unwrap();
        SqliteLifetimeStore::new(db.into_pool())
    }

    fn stamp(server: &str) -> EventStamp {
        EventStamp {
            event_id: FileEventId::new(),
            server_id: server.to_string(),
        }
    }

    fn path(s: &str) -> PortablePath {
        PortablePath::parse(s).unwrap()
    }

    fn lifetime_at(server: &str, p: &str) -> Lifetime {
        let stamp = stamp(server);
        Lifetime::new(FileAction::created(
            &stamp,
            FileId::new(),
            path(p),
            Some(FileId::root_for("USERS")),
            5,
            Some("c0ffee".to_string()),
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_and_get_round_trip() {
        let store = store().await;
        let mut lifetime = lifetime_at("local", "USERS:a/f.txt");
        store.upsert_lifetime(&lifetime).await.unwrap();

        let stamp = stamp("local");
        lifetime
            .add(FileAction::moved(
                &stamp,
                lifetime.id,
                path("USERS:a/f.txt"),
                path("USERS:b/f.txt"),
                None,
                5,
                None,
            ))
            .unwrap();
        store.upsert_lifetime(&lifetime).await.unwrap();
        store.upsert_lifetime(&lifetime).await.unwrap();

        let loaded = store.get_lifetime(lifetime.id).await.unwrap().unwrap();
        assert_eq!(loaded, lifetime);
        assert!(store.get_lifetime(FileId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_queries_are_scoped_by_server() {
        let store = store().await;
        let local = lifetime_at("local", "USERS:a.txt");
        let remote = lifetime_at("remote", "USERS:a.txt");
        store
            .upsert_lifetimes(&[local.clone(), remote.clone()])
            .await
            .unwrap();

        let all = store.get_all_lifetimes("local").await.unwrap();
        assert_eq!(all, vec![local.clone()]);

        let latest = store.get_latest_action("remote").await.unwrap().unwrap();
        assert_eq!(latest.lifetime_id, remote.id);
        assert!(store.get_latest_action("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_actions_by_path_matches_self_and_direct_children() {
        let store = store().await;
        let dir = lifetime_at("local", "USERS:a/");
        let child = lifetime_at("local", "USERS:a/f.txt");
        let nested = lifetime_at("local", "USERS:a/b/g.txt");
        let other = lifetime_at("local", "USERS:z.txt");
        store
            .upsert_lifetimes(&[dir.clone(), child.clone(), nested, other])
            .await
            .unwrap();

        let actions = store
            .get_actions_by_path("local", &path("USERS:a/"))
            .await
            .unwrap();
        let ids: Vec<FileId> = actions.iter().map(|a| a.lifetime_id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&dir.id));
        assert!(ids.contains(&child.id));
        assert!(actions.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_lifetimes_since_is_strict() {
        let store = store().await;
        let mut old = lifetime_at("local", "USERS:old.txt");
        old.actions[0].timestamp = Utc::now() - Duration::hours(2);
        let fresh = lifetime_at("local", "USERS:new.txt");
        store
            .upsert_lifetimes(&[old.clone(), fresh.clone()])
            .await
            .unwrap();

        let since = store
            .get_lifetimes_since("local", Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(since, vec![fresh.clone()]);

        let none = store
            .get_lifetimes_since("local", fresh.actions[0].timestamp)
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
