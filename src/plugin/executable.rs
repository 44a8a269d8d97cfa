//! Plugin executable resolution and process launch.

use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, Stdio};

use crate::envstore::EnvStore;

use super::{PluginError, PluginResult, ENVSTORE_PATH_KEY};

/// Default interpreter for script plugins.
pub const DEFAULT_INTERPRETER: &str = "bash";

/// Script entry point inside a plugin directory.
pub const SCRIPT_ENTRY: &str = "plugin.sh";

/// A resolved plugin entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginExecutable {
    /// A binary invoked directly.
    Native(PathBuf),
    /// A script passed to an interpreter.
    Script { interpreter: String, path: PathBuf },
}

impl PluginExecutable {
    /// Program and leading arguments, before the caller's arguments.
    pub fn command_line(&self) -> (&Path, Vec<&Path>) {
        match self {
            Self::Native(path) => (path, Vec::new()),
            Self::Script { interpreter, path } => (Path::new(interpreter), vec![path.as_path()]),
        }
    }

    /// Run the plugin with `store` loaded into its environment.
    ///
    /// Stdio is inherited and the call blocks until the process exits. Returns
    /// the exit code; a non-zero code is an error.
    pub fn run(
        &self,
        name: &str,
        store: &EnvStore,
        working_dir: Option<&Path>,
        args: &[String],
    ) -> PluginResult<i32> {
        let exec_err = |exit_code: Option<i32>, message: String| PluginError::Execution {
            name: name.to_string(),
            exit_code,
            message,
        };

        let envs = store.to_env_map()?;

        let (program, leading) = self.command_line();
        let mut cmd = ProcessCommand::new(program);
        cmd.args(leading);
        cmd.args(args);
        cmd.envs(&envs);
        cmd.env(ENVSTORE_PATH_KEY, store.path());

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        tracing::debug!(plugin = name, executable = ?self, ?args, "Running plugin");

        let status = cmd.status().map_err(|e| exec_err(None, e.to_string()))?;
        let exit_code = status.code();
        tracing::debug!(plugin = name, ?exit_code, "Plugin run finished");

        match exit_code {
            Some(0) => Ok(0),
            Some(code) => Err(exec_err(Some(code), "plugin exited with a non-zero status".to_string())),
            None => Err(exec_err(None, format!("plugin terminated by signal ({status})"))),
        }
    }
}

/// Locates installed plugins on disk.
pub trait PluginResolver {
    /// Resolve the entry point of the plugin called `name`.
    fn executable(&self, name: &str) -> PluginResult<PluginExecutable>;

    /// Persistent data directory of the plugin called `name`.
    fn data_dir(&self, name: &str) -> PathBuf;
}

/// Standard plugin directory layout:
///
/// ```text
/// <plugins_dir>/<name>/bin/<name>      native executable
/// <plugins_dir>/<name>/src/plugin.sh   script, run with the interpreter
/// <plugins_dir>/<name>/data/           plugin data
/// ```
#[derive(Debug, Clone)]
pub struct PluginLayout {
    plugins_dir: PathBuf,
    interpreter: String,
}

impl PluginLayout {
    /// Create a layout rooted at `plugins_dir`.
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self { plugins_dir: plugins_dir.into(), interpreter: DEFAULT_INTERPRETER.to_string() }
    }

    /// Set the interpreter used for script plugins.
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Root of the plugin installation.
    pub fn plugin_dir(&self, name: &str) -> PathBuf {
        self.plugins_dir.join(name)
    }

    /// Location of a native executable.
    pub fn binary_path(&self, name: &str) -> PathBuf {
        self.plugin_dir(name).join("bin").join(name)
    }

    /// Location of a script entry point.
    pub fn script_path(&self, name: &str) -> PathBuf {
        self.plugin_dir(name).join("src").join(SCRIPT_ENTRY)
    }
}

impl PluginResolver for PluginLayout {
    fn executable(&self, name: &str) -> PluginResult<PluginExecutable> {
        let resolve_err = |reason: String| PluginError::ExecutableResolution { name: name.to_string(), reason };

        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(resolve_err("invalid plugin name".to_string()));
        }

        let binary = self.binary_path(name);
        if binary.is_file() {
            if !is_executable(&binary) {
                return Err(resolve_err(format!("{} is not executable", binary.display())));
            }
            return Ok(PluginExecutable::Native(binary));
        }

        let script = self.script_path(name);
        if script.is_file() {
            return Ok(PluginExecutable::Script { interpreter: self.interpreter.clone(), path: script });
        }

        Err(resolve_err(format!(
            "neither {} nor {} exists",
            binary.display(),
            script.display()
        )))
    }

    fn data_dir(&self, name: &str) -> PathBuf {
        self.plugin_dir(name).join("data")
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata().map(|m| m.permissions().mode() & 0o111 != 0).unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
