//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every field carries a serde default so that an empty file
//! yields a usable configuration.

pub mod database;
pub mod journal;
pub mod logging;
pub mod tree;
pub mod worker;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::journal::JournalConfig;
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::tree::TreeConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// File tree root and reconciliation settings.
    #[serde(default)]
    pub tree: TreeConfig,
    /// Journal queue and identity settings.
    #[serde(default)]
    pub journal: JournalConfig,
    /// History store connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Background job settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from an optional TOML file.
    ///
    /// The file is merged with environment variables prefixed with
    /// `FILEHUB_`, using `__` as the section separator
    /// (`FILEHUB_JOURNAL__SERVER_ID=backup-1`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("FILEHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.tree.root_alias, "USERS");
        assert_eq!(config.journal.queue_capacity, 10);
        assert!(config.tree.discovery);
        assert_eq!(config.worker.rescan_interval_seconds, 0);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = std::env::temp_dir().join(format!("filehub-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("app.toml");
        std::fs::write(
            &path,
            "[journal]\nserver_id = \"backup-1\"\nignore_local = true\n\n[tree]\nroot_alias = \"BACKUP\"\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.journal.server_id, "backup-1");
        assert!(config.journal.ignore_local);
        assert_eq!(config.tree.root_alias, "BACKUP");
        assert_eq!(config.database.max_connections, 5);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
