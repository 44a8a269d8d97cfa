//! Configuration management for Plugrun.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable that turns on CI mode.
pub const CI_ENV_KEY: &str = "CI";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Plugin runtime settings
    pub plugins: PluginsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Disable network-dependent behavior (update checks)
    pub ci: bool,

    /// Data directory override (supports `~` and `$VAR`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

/// Plugin runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Plugins directory override (defaults to `<data_dir>/plugins`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Interpreter for script plugins
    pub interpreter: String,

    /// URL of the JSON version index (`https://` or `file://`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_url: Option<String>,

    /// Minimum hours between two remote update checks
    pub update_check_interval_hours: u64,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            interpreter: crate::plugin::DEFAULT_INTERPRETER.to_string(),
            registry_url: None,
            update_check_interval_hours: 24,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.plugrun.toml` in current directory
    /// 2. `~/.config/plugrun/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(".plugrun.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        tracing::debug!(path = ?path, "Loaded configuration");
        Ok(config)
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("plugrun"))
    }

    /// Resolve the data directory (routes, update-check state, plugins).
    pub fn data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.general.data_dir {
            return expand_path(dir);
        }
        dirs::data_dir()
            .map(|d| d.join("plugrun"))
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))
    }

    /// Resolve the plugins directory for `data_dir`.
    pub fn plugins_dir(&self, data_dir: &Path) -> PathBuf {
        self.plugins
            .dir
            .as_deref()
            .and_then(|dir| expand_path(dir).ok())
            .unwrap_or_else(|| data_dir.join("plugins"))
    }

    /// Whether CI mode is on, from config or the `CI` environment variable.
    pub fn is_ci_mode(&self) -> bool {
        self.general.ci || env_flag(CI_ENV_KEY)
    }

    /// Minimum time between two remote update checks.
    pub fn update_check_interval(&self) -> Duration {
        Duration::from_secs(self.plugins.update_check_interval_hours.saturating_mul(3600))
    }
}

fn expand_path(path: &str) -> anyhow::Result<PathBuf> {
    let expanded = shellexpand::full(path)?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Read a boolean environment flag (`true`/`1`, case-insensitive).
pub fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}
