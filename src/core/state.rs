//! Persisted update-check bookkeeping.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plugin::{PluginError, PluginResult, UpdateCheckState};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_plugin_update_check: Option<DateTime<Utc>>,
}

/// Update-check state stored as JSON in the data directory.
#[derive(Debug, Clone)]
pub struct FileCheckState {
    path: PathBuf,
    ci_mode: bool,
    interval: Duration,
    last_check: Option<DateTime<Utc>>,
}

impl FileCheckState {
    /// State file name inside the data directory.
    pub const FILE_NAME: &'static str = "state.json";

    /// Load the state at `path`. A missing file means no check was ever made.
    pub fn load(path: impl Into<PathBuf>, ci_mode: bool, interval: Duration) -> PluginResult<Self> {
        let path = path.into();
        let persist_err = |e: String| PluginError::Persistence(format!("{}: {e}", path.display()));

        let last_check = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| persist_err(e.to_string()))?;
            let state: StateFile = serde_json::from_str(&content).map_err(|e| persist_err(e.to_string()))?;
            state.last_plugin_update_check
        } else {
            None
        };

        Ok(Self { path, ci_mode, interval, last_check })
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the last remote check ran.
    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        self.last_check
    }

    fn is_due_at(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_check else {
            return true;
        };
        // A clock set backwards yields a negative age, which fails conversion.
        (now - last).to_std().map_or(true, |age| age >= self.interval)
    }
}

impl UpdateCheckState for FileCheckState {
    fn is_ci_mode(&self) -> bool {
        self.ci_mode
    }

    fn is_update_check_due(&self) -> bool {
        self.is_due_at(Utc::now())
    }

    fn record_update_check_performed(&mut self) -> PluginResult<()> {
        let persist_err = |e: String| PluginError::Persistence(format!("{}: {e}", self.path.display()));

        let now = Utc::now();
        let content = serde_json::to_string_pretty(&StateFile { last_plugin_update_check: Some(now) })
            .map_err(|e| persist_err(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| persist_err(e.to_string()))?;
        }
        std::fs::write(&self.path, content).map_err(|e| persist_err(e.to_string()))?;

        self.last_check = Some(now);
        Ok(())
    }
}
