//! # Plugrun
//!
//! Plugin execution runtime for workflow CLIs.
//!
//! Plugrun lets a CLI delegate sub-commands to independently installed
//! executables. Each run gets versioned metadata, a file-backed envstore used
//! as both input and output channel, and rate-limited update notifications.
//!
//! ## Quick Start
//!
//! ```bash
//! # Register an installed plugin
//! plugrun route add hello --source ./hello --version 1.0.0
//!
//! # Run it as a sub-command
//! plugrun run hello -- --name world
//!
//! # From inside a plugin, return a result
//! plugrun envstore add --key PLUGRUN_PLUGIN_OUTPUT --value done
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::ref_option)]
#![allow(clippy::unnecessary_map_or)]

pub mod core;
pub mod envstore;
pub mod plugin;

pub use crate::core::{Config, FileCheckState};
pub use envstore::EnvStore;
pub use plugin::{
    FileRouteStore, Plugin, PluginEngine, PluginError, PluginExecutable, PluginInput, PluginLayout,
    PluginMode, PluginResolver, PluginResult, PluginRoute, RegistryVersionChecker, RouteStore,
    UpdateCheckState, UpdateNotice, VersionChecker,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "plugrun";
