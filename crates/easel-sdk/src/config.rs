use std::path::{Path, PathBuf};
use std::time::Duration;

use easel_history::MAX_HISTORY;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Editor settings, usually read from `easel.toml`.
///
/// Every field is optional in the file; missing ones take their defaults.
///
/// ```toml
/// max_history = 50
/// autosave_debounce_ms = 1000
/// storage_root = "/var/lib/easel"
/// blob_quota_bytes = 52428800
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Snapshots kept by the undo history.
    pub max_history: usize,
    /// Quiet period before the autosave slot is written.
    pub autosave_debounce_ms: u64,
    /// Directory for on-disk stores. `None` keeps everything in memory.
    pub storage_root: Option<PathBuf>,
    /// Upper bound on blob storage, in bytes.
    pub blob_quota_bytes: Option<u64>,
    /// Canvas size used for new documents.
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_history: MAX_HISTORY,
            autosave_debounce_ms: 1000,
            storage_root: None,
            blob_quota_bytes: None,
            canvas_width: 1080,
            canvas_height: 1080,
        }
    }
}

impl EditorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}
