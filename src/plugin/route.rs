//! Plugin routing: persisted version-check bookkeeping per plugin.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Plugin, PluginError, PluginResult};

/// Routing metadata of an installed plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRoute {
    /// Plugin name (unique identifier).
    pub name: String,

    /// Where the plugin was installed from.
    #[serde(default)]
    pub source: String,

    /// Installed version.
    #[serde(default)]
    pub version: String,

    /// Newer version reported by the last remote check. Empty when none.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub latest_available_version: String,

    /// When a newer version was last recorded for this plugin. Checks that
    /// find nothing leave it untouched; the interval clock shared by all
    /// plugins is kept by the update-check state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_check: Option<DateTime<Utc>>,
}

impl PluginRoute {
    /// Create a route for a freshly installed plugin.
    pub fn new(name: impl Into<String>, source: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            version: version.into(),
            latest_available_version: String::new(),
            last_update_check: None,
        }
    }

    /// Whether a newer version has been recorded.
    pub fn has_pending_update(&self) -> bool {
        !self.latest_available_version.is_empty()
    }

    /// The plugin record this route describes.
    pub fn to_plugin(&self) -> Plugin {
        let plugin = Plugin::new(&self.name);
        if self.version.is_empty() {
            plugin
        } else {
            plugin.with_version(&self.version)
        }
    }
}

/// Persistence of plugin routes.
pub trait RouteStore {
    /// Read a route. `Ok(None)` when the plugin has no route.
    fn read_route(&self, name: &str) -> PluginResult<Option<PluginRoute>>;

    /// Insert or replace a route.
    fn write_route(&mut self, route: PluginRoute) -> PluginResult<()>;

    /// All routes, ordered by name.
    fn routes(&self) -> PluginResult<Vec<PluginRoute>>;
}

/// Routing file format.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RoutingFile {
    #[serde(default)]
    route_map: BTreeMap<String, PluginRoute>,
}

/// Route store backed by a YAML file.
///
/// The file is re-read on every access so that concurrent CLI processes see
/// each other's writes. Writers are not coordinated; the last one wins.
#[derive(Debug, Clone)]
pub struct FileRouteStore {
    path: PathBuf,
}

impl FileRouteStore {
    /// Routing file name inside the plugins directory.
    pub const FILE_NAME: &'static str = "routing.yml";

    /// Create a store for the routing file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store for the routing file inside `plugins_dir`.
    pub fn in_dir(plugins_dir: &Path) -> Self {
        Self::new(plugins_dir.join(Self::FILE_NAME))
    }

    /// Path of the routing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> PluginResult<RoutingFile> {
        if !self.path.exists() {
            return Ok(RoutingFile::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| PluginError::Persistence(format!("{}: {e}", self.path.display())))?;
        if content.trim().is_empty() {
            return Ok(RoutingFile::default());
        }

        serde_yaml::from_str(&content)
            .map_err(|e| PluginError::Persistence(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, routing: &RoutingFile) -> PluginResult<()> {
        let persist_err = |e: String| PluginError::Persistence(format!("{}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| persist_err(e.to_string()))?;
        }

        let content = serde_yaml::to_string(routing).map_err(|e| persist_err(e.to_string()))?;
        std::fs::write(&self.path, content).map_err(|e| persist_err(e.to_string()))
    }
}

impl RouteStore for FileRouteStore {
    fn read_route(&self, name: &str) -> PluginResult<Option<PluginRoute>> {
        Ok(self.load()?.route_map.remove(name))
    }

    fn write_route(&mut self, route: PluginRoute) -> PluginResult<()> {
        let mut routing = self.load()?;
        tracing::debug!(plugin = %route.name, path = ?self.path, "Writing plugin route");
        routing.route_map.insert(route.name.clone(), route);
        self.save(&routing)
    }

    fn routes(&self) -> PluginResult<Vec<PluginRoute>> {
        Ok(self.load()?.route_map.into_values().collect())
    }
}
