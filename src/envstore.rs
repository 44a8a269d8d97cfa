//! File-backed envstore.
//!
//! An envstore is a small YAML document holding an ordered list of
//! single-entry maps:
//!
//! ```yaml
//! envs:
//! - PLUGRUN_PLUGIN_INPUT_PLUGIN_MODE: command
//! - PLUGRUN_PLUGIN_OUTPUT: done
//! ```
//!
//! It is the channel between the runtime and a plugin process: the runtime
//! seeds it, exports it into the child's environment, and reads it back once
//! the child exits. `envs` is always the last top-level key, so any process in
//! the plugin's tree may append `- KEY: value` lines without a YAML library.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::plugin::{PluginError, PluginResult};

/// Valid envstore key: a portable environment variable name.
static KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid key pattern"));

/// On-disk layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct EnvStoreFile {
    #[serde(default, deserialize_with = "null_as_empty")]
    envs: Vec<Entry>,
}

/// Values are read as their source text, so `1.10` stays `1.10`. An empty
/// value is null.
type Entry = BTreeMap<String, Option<String>>;

/// `envs:` with no items parses as null.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Entry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// Handle to an envstore file.
#[derive(Debug, Clone)]
pub struct EnvStore {
    path: PathBuf,
}

impl EnvStore {
    /// Create (or truncate) an envstore at `path`.
    pub fn init(path: impl Into<PathBuf>) -> PluginResult<Self> {
        let store = Self { path: path.into() };
        store
            .write_file(&EnvStoreFile::default())
            .map_err(|message| PluginError::StoreInit { path: store.path.clone(), message })?;
        Ok(store)
    }

    /// Attach to an existing envstore.
    pub fn open(path: impl Into<PathBuf>) -> PluginResult<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(PluginError::StoreInit {
                path,
                message: "envstore file does not exist".to_string(),
            });
        }
        Ok(Self { path })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry.
    ///
    /// Existing entries are kept; a repeated key shadows the earlier value.
    pub fn add(&self, key: &str, value: &str) -> PluginResult<()> {
        let write_err = |message: String| PluginError::StoreWrite {
            path: self.path.clone(),
            key: key.to_string(),
            message,
        };

        if !KEY_PATTERN.is_match(key) {
            return Err(write_err("invalid key".to_string()));
        }

        let mut file = self.read_file().map_err(write_err)?;
        file.envs.push(BTreeMap::from([(key.to_string(), Some(value.to_string()))]));
        self.write_file(&file).map_err(write_err)?;

        tracing::trace!(path = ?self.path, key, "Added envstore entry");
        Ok(())
    }

    /// All entries in file order. Nested values are rejected.
    pub fn entries(&self) -> PluginResult<Vec<(String, String)>> {
        let file = self
            .read_file()
            .map_err(|message| PluginError::OutputParse { path: self.path.clone(), message })?;

        Ok(file
            .envs
            .into_iter()
            .flatten()
            .map(|(key, value)| (key, value.unwrap_or_default()))
            .collect())
    }

    /// Entries collapsed into a map. Later entries win.
    pub fn to_env_map(&self) -> PluginResult<BTreeMap<String, String>> {
        Ok(self.entries()?.into_iter().collect())
    }

    /// Look up the effective value of a single key.
    pub fn get(&self, key: &str) -> PluginResult<Option<String>> {
        Ok(self.to_env_map()?.remove(key))
    }

    /// Structured dump of the collapsed store.
    pub fn to_json(&self) -> PluginResult<String> {
        let map = self.to_env_map()?;
        serde_json::to_string_pretty(&map)
            .map_err(|e| PluginError::OutputParse { path: self.path.clone(), message: e.to_string() })
    }

    fn read_file(&self) -> Result<EnvStoreFile, String> {
        let content = fs::read_to_string(&self.path).map_err(|e| e.to_string())?;
        if content.trim().is_empty() {
            return Ok(EnvStoreFile::default());
        }
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    }

    fn write_file(&self, file: &EnvStoreFile) -> Result<(), String> {
        // An empty list serializes as `envs: []`, which cannot be appended to.
        let content = if file.envs.is_empty() {
            "envs:\n".to_string()
        } else {
            serde_yaml::to_string(file).map_err(|e| e.to_string())?
        };
        fs::write(&self.path, content).map_err(|e| e.to_string())
    }
}
