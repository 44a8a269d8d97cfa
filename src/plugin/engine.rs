//! Plugin run orchestration.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::{Config, FileCheckState};
use crate::envstore::EnvStore;

use super::{
    extract_output, FileRouteStore, Plugin, PluginInput, PluginLayout, PluginMode, PluginResolver,
    PluginResult, RegistryVersionChecker, RouteStore, UpdateCheckState, UpdateNotice,
    UpdateScheduler, VersionChecker, CLI_VERSION_KEY, DATA_DIR_KEY, ENVSTORE_PATH_KEY,
    PLUGIN_MODE_KEY,
};

/// File name of the envstore inside a work directory.
pub const ENVSTORE_FILE: &str = "envstore.yml";

/// Prefix of per-run work directories.
pub const WORK_DIR_PREFIX: &str = "plugin-work-dir";

/// Version checker used when no version index is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVersionIndex;

impl VersionChecker for NoVersionIndex {
    fn latest_version(&self, plugin: &Plugin) -> PluginResult<String> {
        tracing::debug!(plugin = %plugin.name, "No version index configured");
        Ok(String::new())
    }
}

/// Runs plugins: update check, envstore setup, execution and output harvest.
pub struct PluginEngine {
    routes: Box<dyn RouteStore>,
    checker: Box<dyn VersionChecker>,
    state: Box<dyn UpdateCheckState>,
    resolver: Box<dyn PluginResolver>,
    cli_version: String,
    temp_root: Option<PathBuf>,
}

impl PluginEngine {
    /// Create an engine over the given collaborators.
    pub fn new(
        routes: Box<dyn RouteStore>,
        checker: Box<dyn VersionChecker>,
        state: Box<dyn UpdateCheckState>,
        resolver: Box<dyn PluginResolver>,
    ) -> Self {
        Self {
            routes,
            checker,
            state,
            resolver,
            cli_version: crate::VERSION.to_string(),
            temp_root: None,
        }
    }

    /// Create an engine wired to the on-disk stores described by `config`.
    pub fn from_config(config: &Config, data_dir: &Path) -> PluginResult<Self> {
        let plugins_dir = config.plugins_dir(data_dir);

        let routes = FileRouteStore::in_dir(&plugins_dir);
        let resolver = PluginLayout::new(&plugins_dir).with_interpreter(&config.plugins.interpreter);
        let state = FileCheckState::load(
            data_dir.join(FileCheckState::FILE_NAME),
            config.is_ci_mode(),
            config.update_check_interval(),
        )?;
        let checker: Box<dyn VersionChecker> = match &config.plugins.registry_url {
            Some(url) => Box::new(RegistryVersionChecker::new(url.as_str())),
            None => Box::new(NoVersionIndex),
        };

        Ok(Self::new(Box::new(routes), checker, Box::new(state), Box::new(resolver)))
    }

    /// Override the version reported to plugins.
    #[must_use]
    pub fn with_cli_version(mut self, version: impl Into<String>) -> Self {
        self.cli_version = version.into();
        self
    }

    /// Create work directories under `root` instead of the system temp dir.
    #[must_use]
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Route store in use.
    pub fn routes(&self) -> &dyn RouteStore {
        self.routes.as_ref()
    }

    /// Route store in use, mutably.
    pub fn routes_mut(&mut self) -> &mut dyn RouteStore {
        self.routes.as_mut()
    }

    /// Run a plugin in response to a workflow event.
    pub fn run_by_event(&mut self, plugin: &Plugin, mut input: PluginInput) -> PluginResult<Option<String>> {
        input.insert(PLUGIN_MODE_KEY.to_string(), PluginMode::Trigger.as_str().to_string());
        self.run_plugin(plugin, &[], input)
    }

    /// Run a plugin as a CLI sub-command.
    pub fn run_by_command(&mut self, plugin: &Plugin, args: &[String]) -> PluginResult<Option<String>> {
        let input =
            PluginInput::from([(PLUGIN_MODE_KEY.to_string(), PluginMode::Command.as_str().to_string())]);
        self.run_plugin(plugin, args, input)
    }

    /// Run `plugin` with `args`, handing it `input` through a fresh envstore.
    ///
    /// Returns the plugin's output, if it set one. The work directory holding
    /// the envstore is removed on every exit path.
    pub fn run_plugin(
        &mut self,
        plugin: &Plugin,
        args: &[String],
        mut input: PluginInput,
    ) -> PluginResult<Option<String>> {
        let notice =
            UpdateScheduler::new(self.state.as_mut(), self.checker.as_ref(), self.routes.as_mut())
                .run(plugin)?;
        if let UpdateNotice::CheckFailed(reason) = &notice {
            tracing::debug!(plugin = %plugin.name, reason = %reason, "Continuing without update check");
        }

        input.insert(CLI_VERSION_KEY.to_string(), self.cli_version.clone());
        input.insert(DATA_DIR_KEY.to_string(), self.resolver.data_dir(&plugin.name).to_string_lossy().into_owned());

        let work_dir = self.create_work_dir()?;
        let output = self.run_in(plugin, args, &input, work_dir.path());

        let work_dir_path = work_dir.path().to_path_buf();
        if let Err(e) = work_dir.close() {
            tracing::warn!(path = ?work_dir_path, error = %e, "Failed to remove plugin work dir");
        }

        output
    }

    fn run_in(
        &self,
        plugin: &Plugin,
        args: &[String],
        input: &PluginInput,
        work_dir: &Path,
    ) -> PluginResult<Option<String>> {
        let store = EnvStore::init(work_dir.join(ENVSTORE_FILE))?;
        store.add(ENVSTORE_PATH_KEY, &store.path().to_string_lossy())?;
        tracing::debug!(path = ?store.path(), "Plugin envstore");

        let mut entries: Vec<_> = input.iter().collect();
        entries.sort();
        for (key, value) in entries {
            store.add(key, value)?;
        }

        let executable = self.resolver.executable(&plugin.name)?;
        executable.run(&plugin.name, &store, None, args)?;

        let output = extract_output(&store)?;
        if let Some(value) = &output {
            tracing::info!(plugin = %plugin.name, output = %value, "Plugin returned output");
        }
        Ok(output)
    }

    fn create_work_dir(&self) -> PluginResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORK_DIR_PREFIX);
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}
