//! Plugin runtime error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors that can occur while routing and running a plugin.
///
/// Every variant except [`PluginError::RemoteCheck`] is fatal for a plugin
/// run and is propagated unmodified to the caller of the engine.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A loaded plugin has no route. Routes are created at install time.
    #[error("No route found for already loaded plugin ({0})")]
    RouteNotFound(String),

    /// The remote version check failed. Logged and skipped by the scheduler.
    #[error("Failed to check for plugin ({name}) new version: {message}")]
    RemoteCheck { name: String, message: String },

    /// Routing or update-check state could not be saved or loaded.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The envstore file could not be created.
    #[error("Failed to initialize envstore at {path}: {message}")]
    StoreInit { path: PathBuf, message: String },

    /// An entry could not be written to the envstore.
    #[error("Failed to add '{key}' to envstore at {path}: {message}")]
    StoreWrite { path: PathBuf, key: String, message: String },

    /// The plugin's files are missing or unusable.
    #[error("Failed to resolve executable of plugin ({name}): {reason}")]
    ExecutableResolution { name: String, reason: String },

    /// The plugin process failed to launch or exited unsuccessfully.
    #[error("Plugin ({name}) execution failed{}: {message}", exit_suffix(.exit_code))]
    Execution { name: String, exit_code: Option<i32>, message: String },

    /// The envstore could not be read back after execution.
    #[error("Failed to read plugin output from {path}: {message}")]
    OutputParse { path: PathBuf, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_suffix(exit_code: &Option<i32>) -> String {
    exit_code.map(|code| format!(" with exit code {code}")).unwrap_or_default()
}

impl PluginError {
    /// Whether the error must abort a plugin run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::RemoteCheck { .. })
    }

    /// Exit code carried by an execution failure, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Execution { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}
