//! Logging configuration.

use serde::{Deserialize, Serialize};

/// Output shape of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Filter and format for the process-wide subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level for FileHub crates.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Level applied to `sqlx`, whose statement logging is noisy at `info`.
    #[serde(default = "default_sqlx_level")]
    pub sqlx_level: String,
}

impl LoggingConfig {
    /// `EnvFilter` directive built from the configured levels.
    pub fn filter_directive(&self) -> String {
        format!("{},sqlx={}", self.level, self.sqlx_level)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            sqlx_level: default_sqlx_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_sqlx_level() -> String {
    "warn".to_string()
}
