//! Journal configuration.

use serde::{Deserialize, Serialize};

/// Settings for the history journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Identity of this server, stamped on every event and action.
    #[serde(default = "default_server_id")]
    pub server_id: String,
    /// Capacity of the bounded event queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Mirror mode: locally observed changes never produce events.
    #[serde(default)]
    pub ignore_local: bool,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            server_id: default_server_id(),
            queue_capacity: default_queue_capacity(),
            ignore_local: false,
        }
    }
}

fn default_server_id() -> String {
    "local".to_string()
}

fn default_queue_capacity() -> usize {
    10
}
