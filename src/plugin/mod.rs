//! Plugin execution runtime.
//!
//! Plugins are independently installed executables (native binaries or shell
//! scripts) that the CLI runs as sub-commands or in response to workflow
//! events. A run goes through these stages:
//!
//! 1. **Update check**: at most once per interval, and never in CI mode, the
//!    newest published version is looked up and remembered in the plugin's
//!    route. A remembered update is reported on every run until installed.
//! 2. **Envstore**: a fresh envstore is created in a private work directory
//!    and seeded with the plugin input (mode, CLI version, data directory).
//! 3. **Execution**: the plugin runs with the envstore exported into its
//!    environment and `PLUGRUN_ENVSTORE_PATH` pointing at the store.
//! 4. **Output**: the store is read back; `PLUGRUN_PLUGIN_OUTPUT` is the
//!    plugin's result.
//!
//! The work directory is removed whatever the outcome.

mod engine;
mod error;
mod executable;
mod output;
mod route;
mod types;
mod update;

pub use engine::{NoVersionIndex, PluginEngine, ENVSTORE_FILE, WORK_DIR_PREFIX};
pub use error::{PluginError, PluginResult};
pub use executable::{PluginExecutable, PluginLayout, PluginResolver, DEFAULT_INTERPRETER, SCRIPT_ENTRY};
pub use output::extract_output;
pub use route::{FileRouteStore, PluginRoute, RouteStore};
pub use types::{
    Plugin, PluginInput, PluginMode, CLI_VERSION_KEY, DATA_DIR_KEY, ENVSTORE_PATH_KEY,
    PLUGIN_MODE_KEY, PLUGIN_OUTPUT_KEY,
};
pub use update::{
    RegistryVersionChecker, UpdateCheckState, UpdateNotice, UpdateScheduler, VersionChecker,
};
