//! SQLite connection pool management.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use filehub_core::config::DatabaseConfig;
use filehub_core::error::{AppError, ErrorKind};

/// Wrapper around the sqlx SQLite connection pool.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    /// The underlying sqlx connection pool.
    pool: SqlitePool,
}

impl DatabasePool {
    /// Create a new database pool from configuration.
    ///
    /// The database file and its parent directory are created when missing.
    /// In-memory URLs get a single long-lived connection, since every
    /// SQLite memory connection is its own database.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let in_memory = is_memory_url(&config.url);
        info!(
            url = %config.url,
            max_connections = config.max_connections,
            in_memory,
            "Connecting to SQLite"
        );

        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    format!("Invalid database URL '{}': {e}", config.url),
                    e,
                )
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds));

        if in_memory {
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            options = options.journal_mode(SqliteJournalMode::Wal);
            pool_options = pool_options.max_connections(config.max_connections.max(1));
        }

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to connect to database: {e}"),
                e,
            )
        })?;

        info!("Successfully connected to SQLite");
        Ok(Self { pool })
    }

    /// Open a private in-memory database, mostly for tests and dry runs.
    pub async fn in_memory() -> Result<Self, AppError> {
        Self::connect(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        })
        .await
    }

    /// Return a reference to the underlying sqlx pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Return the underlying sqlx pool (consuming self).
    pub fn into_pool(self) -> SqlitePool {
        self.pool
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Health check failed", e))
    }

    /// Close all connections in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_memory_url() {
        assert!(is_memory_url("sqlite::memory:"));
        assert!(is_memory_url("sqlite://file:history?mode=memory&cache=shared"));
        assert!(!is_memory_url("sqlite://data/history.db"));
    }

    #[tokio::test]
    async fn test_connect_creates_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            ..DatabaseConfig::default()
        };

        let db = DatabasePool::connect(&config).await.unwrap();
        assert!(db.health_check().await.unwrap());
        assert!(path.exists());
        db.close().await;
    }
}
