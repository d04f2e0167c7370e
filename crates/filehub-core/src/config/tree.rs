//! File tree configuration.

use serde::{Deserialize, Serialize};

/// Settings for the mirrored filesystem root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Directory mirrored by the tree. Relative paths are resolved against
    /// the working directory at startup.
    #[serde(default = "default_root_path")]
    pub root_path: String,
    /// Alias that prefixes every portable path (`USERS:a/b.txt`).
    #[serde(default = "default_root_alias")]
    pub root_alias: String,
    /// Adopt on-disk entries unknown to the journal during reconciliation.
    #[serde(default = "default_true")]
    pub discovery: bool,
    /// Filenames never added to the tree.
    #[serde(default = "default_ignore_filenames")]
    pub ignore_filenames: Vec<String>,
    /// Attach SHA-256 content ids to newly discovered files.
    #[serde(default = "default_true")]
    pub hash_contents: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            root_alias: default_root_alias(),
            discovery: true,
            ignore_filenames: default_ignore_filenames(),
            hash_contents: true,
        }
    }
}

fn default_root_path() -> String {
    "./data/files".to_string()
}

fn default_root_alias() -> String {
    "USERS".to_string()
}

fn default_ignore_filenames() -> Vec<String> {
    vec![".DS_Store".to_string(), ".content".to_string()]
}

fn default_true() -> bool {
    true
}
