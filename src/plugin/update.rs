//! Plugin update checks.
//!
//! Checking a remote index on every invocation would add network latency to
//! every plugin run, so checks are rate-limited by an [`UpdateCheckState`]
//! and their result is remembered in the plugin's route. Between checks the
//! remembered version keeps being reported until the plugin is updated.

use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;

use super::{Plugin, PluginError, PluginResult, RouteStore};

/// Update-check scheduling state, injected into the scheduler.
pub trait UpdateCheckState {
    /// Whether network-dependent behavior is disabled.
    fn is_ci_mode(&self) -> bool;

    /// Whether the check interval has elapsed since the last check.
    fn is_update_check_due(&self) -> bool;

    /// Restart the check interval from now.
    fn record_update_check_performed(&mut self) -> PluginResult<()>;
}

/// Remote lookup of the newest published plugin version.
pub trait VersionChecker {
    /// Newer version of `plugin`, or an empty string when there is none.
    fn latest_version(&self, plugin: &Plugin) -> PluginResult<String>;
}

/// What the scheduler surfaced for a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateNotice {
    /// No newer version known.
    UpToDate,
    /// A newer version is available.
    Available(String),
    /// The remote check failed and was skipped.
    CheckFailed(String),
}

/// Decides whether to check for a plugin update and records the outcome.
pub struct UpdateScheduler<'a> {
    state: &'a mut dyn UpdateCheckState,
    checker: &'a dyn VersionChecker,
    routes: &'a mut dyn RouteStore,
}

impl<'a> UpdateScheduler<'a> {
    /// Create a scheduler over the given collaborators.
    pub fn new(
        state: &'a mut dyn UpdateCheckState,
        checker: &'a dyn VersionChecker,
        routes: &'a mut dyn RouteStore,
    ) -> Self {
        Self { state, checker, routes }
    }

    /// Run the update check for `plugin`, or report a previously found update.
    ///
    /// Remote failures are logged and skipped. Missing routes and
    /// persistence failures abort.
    ///
    /// A due check that finds no update never reads the route, so an
    /// unrouted plugin only fails with [`PluginError::RouteNotFound`] on a
    /// later run that reads it.
    pub fn run(&mut self, plugin: &Plugin) -> PluginResult<UpdateNotice> {
        if !self.state.is_ci_mode() && self.state.is_update_check_due() {
            let notice = self.check_remote(plugin)?;
            self.state.record_update_check_performed()?;
            Ok(notice)
        } else {
            let route = self
                .routes
                .read_route(&plugin.name)?
                .ok_or_else(|| PluginError::RouteNotFound(plugin.name.clone()))?;

            if route.has_pending_update() {
                warn_new_version(&plugin.name, &route.latest_available_version);
                Ok(UpdateNotice::Available(route.latest_available_version))
            } else {
                Ok(UpdateNotice::UpToDate)
            }
        }
    }

    fn check_remote(&mut self, plugin: &Plugin) -> PluginResult<UpdateNotice> {
        tracing::info!(plugin = %plugin.name, "Checking for plugin new version");

        let new_version = match self.checker.latest_version(plugin) {
            Ok(version) => version,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(plugin = %plugin.name, error = %e, "Failed to check for plugin new version");
                return Ok(UpdateNotice::CheckFailed(e.to_string()));
            }
        };

        if new_version.is_empty() {
            tracing::debug!(plugin = %plugin.name, "No new version of plugin available");
            return Ok(UpdateNotice::UpToDate);
        }

        warn_new_version(&plugin.name, &new_version);

        let mut route = self
            .routes
            .read_route(&plugin.name)?
            .ok_or_else(|| PluginError::RouteNotFound(plugin.name.clone()))?;
        route.latest_available_version.clone_from(&new_version);
        route.last_update_check = Some(Utc::now());

        self.routes.write_route(route).map_err(|e| {
            PluginError::Persistence(format!(
                "failed to register available plugin ({}) update ({new_version}): {e}",
                plugin.name
            ))
        })?;

        Ok(UpdateNotice::Available(new_version))
    }
}

fn warn_new_version(name: &str, version: &str) {
    tracing::warn!(plugin = name, version, "New version ({version}) of plugin ({name}) available");
}

/// Version index format.
#[derive(Debug, Deserialize)]
struct VersionIndex {
    #[serde(default)]
    plugins: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    name: String,
    version: String,
}

/// Checks a JSON version index, fetched over HTTP(S) or read from a
/// `file://` URL.
///
/// Any published version that differs from the installed one is reported;
/// versions are not ordered.
#[derive(Debug, Clone)]
pub struct RegistryVersionChecker {
    index_url: String,
    timeout: Duration,
}

impl RegistryVersionChecker {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a checker for the index at `index_url`.
    pub fn new(index_url: impl Into<String>) -> Self {
        Self { index_url: index_url.into(), timeout: Self::DEFAULT_TIMEOUT }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Index URL.
    pub fn index_url(&self) -> &str {
        &self.index_url
    }

    fn fetch_index(&self) -> Result<VersionIndex, String> {
        if let Some(path) = self.index_url.strip_prefix("file://") {
            let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
            return serde_json::from_str(&content).map_err(|e| format!("Invalid version index: {e}"));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .user_agent(format!("plugrun/{}", crate::VERSION))
            .build()
            .map_err(|e| e.to_string())?;

        let response = client.get(&self.index_url).send().map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("Failed to fetch version index: HTTP {}", response.status()));
        }

        response.json().map_err(|e| format!("Invalid version index: {e}"))
    }
}

impl VersionChecker for RegistryVersionChecker {
    fn latest_version(&self, plugin: &Plugin) -> PluginResult<String> {
        let index = self
            .fetch_index()
            .map_err(|message| PluginError::RemoteCheck { name: plugin.name.clone(), message })?;

        let published = index.plugins.into_iter().find(|entry| entry.name == plugin.name);
        Ok(match published {
            Some(entry) if entry.version != plugin.installed_version() => entry.version,
            _ => String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{FileRouteStore, PluginRoute};
    use std::cell::Cell;
    use tempfile::TempDir;

    struct FakeState {
        ci: bool,
        due: bool,
        recorded: usize,
    }

    impl UpdateCheckState for FakeState {
        fn is_ci_mode(&self) -> bool {
            self.ci
        }

        fn is_update_check_due(&self) -> bool {
            self.due
        }

        fn record_update_check_performed(&mut self) -> PluginResult<()> {
            self.recorded += 1;
            Ok(())
        }
    }

    struct FakeChecker {
        answer: Result<String, String>,
        calls: Cell<usize>,
    }

    impl FakeChecker {
        fn returning(version: &str) -> Self {
            Self { answer: Ok(version.to_string()), calls: Cell::new(0) }
        }

        fn failing(message: &str) -> Self {
            Self { answer: Err(message.to_string()), calls: Cell::new(0) }
        }
    }

    impl VersionChecker for FakeChecker {
        fn latest_version(&self, plugin: &Plugin) -> PluginResult<String> {
            self.calls.set(self.calls.get() + 1);
            self.answer.clone().map_err(|message| PluginError::RemoteCheck {
                name: plugin.name.clone(),
                message,
            })
        }
    }

    fn routes_with(temp_dir: &TempDir, route: PluginRoute) -> FileRouteStore {
        let mut routes = FileRouteStore::in_dir(temp_dir.path());
        routes.write_route(route).unwrap();
        routes
    }

    #[test]
    fn test_ci_mode_never_checks() {
        let temp_dir = TempDir::new().unwrap();
        let mut routes = routes_with(&temp_dir, PluginRoute::new("alpha", "local", "1.0.0"));
        let mut state = FakeState { ci: true, due: true, recorded: 0 };
        let checker = FakeChecker::returning("2.0.0");

        let notice = UpdateScheduler::new(&mut state, &checker, &mut routes)
            .run(&Plugin::new("alpha"))
            .unwrap();

        assert_eq!(notice, UpdateNotice::UpToDate);
        assert_eq!(checker.calls.get(), 0);
        assert_eq!(state.recorded, 0);
    }

    #[test]
    fn test_not_due_reports_recorded_version() {
        let temp_dir = TempDir::new().unwrap();
        let mut route = PluginRoute::new("alpha", "local", "1.0.0");
        route.latest_available_version = "1.5.0".to_string();
        let mut routes = routes_with(&temp_dir, route);
        let mut state = FakeState { ci: false, due: false, recorded: 0 };
        let checker = FakeChecker::returning("2.0.0");

        let notice = UpdateScheduler::new(&mut state, &checker, &mut routes)
            .run(&Plugin::new("alpha"))
            .unwrap();

        assert_eq!(notice, UpdateNotice::Available("1.5.0".to_string()));
        assert_eq!(checker.calls.get(), 0);
    }

    #[test]
    fn test_due_check_records_new_version() {
        let temp_dir = TempDir::new().unwrap();
        let mut routes = routes_with(&temp_dir, PluginRoute::new("beta", "local", "1.0.0"));
        let mut state = FakeState { ci: false, due: true, recorded: 0 };
        let checker = FakeChecker::returning("0.9.0");

        let notice = UpdateScheduler::new(&mut state, &checker, &mut routes)
            .run(&Plugin::new("beta").with_version("1.0.0"))
            .unwrap();

        assert_eq!(notice, UpdateNotice::Available("0.9.0".to_string()));
        assert_eq!(state.recorded, 1);

        let route = routes.read_route("beta").unwrap().unwrap();
        assert_eq!(route.latest_available_version, "0.9.0");
        assert!(route.last_update_check.is_some());
    }

    #[test]
    fn test_due_check_without_update_still_records_check() {
        let temp_dir = TempDir::new().unwrap();
        let mut routes = routes_with(&temp_dir, PluginRoute::new("alpha", "local", "1.0.0"));
        let mut state = FakeState { ci: false, due: true, recorded: 0 };
        let checker = FakeChecker::returning("");

        let notice = UpdateScheduler::new(&mut state, &checker, &mut routes)
            .run(&Plugin::new("alpha"))
            .unwrap();

        assert_eq!(notice, UpdateNotice::UpToDate);
        assert_eq!(state.recorded, 1);
        assert!(!routes.read_route("alpha").unwrap().unwrap().has_pending_update());
    }

    #[test]
    fn test_remote_failure_is_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let mut routes = routes_with(&temp_dir, PluginRoute::new("alpha", "local", "1.0.0"));
        let mut state = FakeState { ci: false, due: true, recorded: 0 };
        let checker = FakeChecker::failing("connection refused");

        let notice = UpdateScheduler::new(&mut state, &checker, &mut routes)
            .run(&Plugin::new("alpha"))
            .unwrap();

        assert!(matches!(notice, UpdateNotice::CheckFailed(ref m) if m.contains("connection refused")));
        assert_eq!(checker.calls.get(), 1);
        assert_eq!(state.recorded, 1);
    }

    struct BrokenChecker;

    impl VersionChecker for BrokenChecker {
        fn latest_version(&self, _plugin: &Plugin) -> PluginResult<String> {
            Err(PluginError::Persistence("index cache unreadable".to_string()))
        }
    }

    #[test]
    fn test_fatal_checker_error_aborts() {
        let temp_dir = TempDir::new().unwrap();
        let mut routes = routes_with(&temp_dir, PluginRoute::new("alpha", "local", "1.0.0"));
        let mut state = FakeState { ci: false, due: true, recorded: 0 };

        let result = UpdateScheduler::new(&mut state, &BrokenChecker, &mut routes).run(&Plugin::new("alpha"));

        assert!(matches!(result, Err(PluginError::Persistence(_))));
        assert_eq!(state.recorded, 0);
    }

    #[test]
    fn test_due_check_without_update_skips_route_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let mut routes = FileRouteStore::in_dir(temp_dir.path());
        let mut state = FakeState { ci: false, due: true, recorded: 0 };
        let checker = FakeChecker::returning("");

        let notice = UpdateScheduler::new(&mut state, &checker, &mut routes).run(&Plugin::new("gamma")).unwrap();
        assert_eq!(notice, UpdateNotice::UpToDate);

        state.due = false;
        let result = UpdateScheduler::new(&mut state, &checker, &mut routes).run(&Plugin::new("gamma"));
        assert!(matches!(result, Err(PluginError::RouteNotFound(ref n)) if n == "gamma"));
    }

    #[test]
    fn test_missing_route_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let mut routes = FileRouteStore::in_dir(temp_dir.path());
        let checker = FakeChecker::returning("2.0.0");

        let mut state = FakeState { ci: false, due: false, recorded: 0 };
        let result = UpdateScheduler::new(&mut state, &checker, &mut routes).run(&Plugin::new("gamma"));
        assert!(matches!(result, Err(PluginError::RouteNotFound(ref n)) if n == "gamma"));

        let mut state = FakeState { ci: false, due: true, recorded: 0 };
        let result = UpdateScheduler::new(&mut state, &checker, &mut routes).run(&Plugin::new("gamma"));
        assert!(matches!(result, Err(PluginError::RouteNotFound(_))));
        assert_eq!(state.recorded, 0);
    }

    #[test]
    fn test_registry_checker_reads_file_index() {
        let temp_dir = TempDir::new().unwrap();
        let index_path = temp_dir.path().join("index.json");
        std::fs::write(
            &index_path,
            r#"{"plugins": [{"name": "alpha", "version": "1.0.0"}, {"name": "beta", "version": "2.0.0"}]}"#,
        )
        .unwrap();

        let checker = RegistryVersionChecker::new(format!("file://{}", index_path.display()));

        let beta = Plugin::new("beta").with_version("1.0.0");
        assert_eq!(checker.latest_version(&beta).unwrap(), "2.0.0");

        let alpha = Plugin::new("alpha").with_version("1.0.0");
        assert_eq!(checker.latest_version(&alpha).unwrap(), "");

        let unknown = Plugin::new("delta");
        assert_eq!(checker.latest_version(&unknown).unwrap(), "");
    }

    #[test]
    fn test_registry_checker_missing_index() {
        let temp_dir = TempDir::new().unwrap();
        let checker =
            RegistryVersionChecker::new(format!("file://{}", temp_dir.path().join("nope.json").display()));

        let result = checker.latest_version(&Plugin::new("alpha"));
        assert!(matches!(result, Err(PluginError::RemoteCheck { .. })));
    }
}
