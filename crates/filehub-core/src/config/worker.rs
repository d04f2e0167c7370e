//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Background job worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of jobs allowed to run at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Seconds between full-tree rescans. Zero disables them.
    #[serde(default)]
    pub rescan_interval_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            rescan_interval_seconds: 0,
        }
    }
}

fn default_concurrency() -> usize {
    4
}
