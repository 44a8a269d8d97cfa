//! Core plugin types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Envstore key holding the invocation mode.
pub const PLUGIN_MODE_KEY: &str = "PLUGRUN_PLUGIN_INPUT_PLUGIN_MODE";

/// Envstore key holding the host CLI version.
pub const CLI_VERSION_KEY: &str = "PLUGRUN_PLUGIN_INPUT_CLI_VERSION";

/// Envstore key holding the plugin's persistent data directory.
pub const DATA_DIR_KEY: &str = "PLUGRUN_PLUGIN_INPUT_DATA_DIR";

/// Envstore key (and environment variable) pointing at the envstore itself.
pub const ENVSTORE_PATH_KEY: &str = "PLUGRUN_ENVSTORE_PATH";

/// Envstore key a plugin sets to return a structured result.
pub const PLUGIN_OUTPUT_KEY: &str = "PLUGRUN_PLUGIN_OUTPUT";

/// Input handed to a plugin through its envstore.
pub type PluginInput = HashMap<String, String>;

/// How a plugin was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginMode {
    /// Launched by a workflow event.
    Trigger,
    /// Launched as a CLI sub-command.
    Command,
}

impl PluginMode {
    /// Wire value stored under [`PLUGIN_MODE_KEY`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Command => "command",
        }
    }
}

impl std::fmt::Display for PluginMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An installed plugin, as seen by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    /// Plugin name (unique identifier).
    pub name: String,
    /// Installed version, if known.
    #[serde(default)]
    pub version: Option<String>,
}

impl Plugin {
    /// Create a plugin record.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), version: None }
    }

    /// Set the installed version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Installed version or an empty string.
    pub fn installed_version(&self) -> &str {
        self.version.as_deref().unwrap_or_default()
    }
}
