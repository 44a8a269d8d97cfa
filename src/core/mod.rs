//! Core configuration and persisted state for Plugrun.

mod config;
mod state;

pub use config::{env_flag, Config, GeneralConfig, PluginsConfig, CI_ENV_KEY};
pub use state::FileCheckState;
