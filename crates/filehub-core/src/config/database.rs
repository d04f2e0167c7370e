//! History store configuration.

use serde::{Deserialize, Serialize};

/// Database connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL. `sqlite::memory:` keeps history in memory.
    #[serde(default = "default_url")]
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_connections: default_max_connections(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

fn default_url() -> String {
    "sqlite://data/history.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}
