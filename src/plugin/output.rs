//! Harvesting a plugin's structured output.

use crate::envstore::EnvStore;

use super::{PluginResult, PLUGIN_OUTPUT_KEY};

/// Read the plugin's output from its envstore.
///
/// `Ok(None)` means the plugin did not set [`PLUGIN_OUTPUT_KEY`].
pub fn extract_output(store: &EnvStore) -> PluginResult<Option<String>> {
    let output = store.get(PLUGIN_OUTPUT_KEY)?;
    match &output {
        Some(value) => tracing::debug!(output = %value, "Plugin output"),
        None => tracing::debug!("Plugin produced no output"),
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginError;
    use tempfile::TempDir;

    #[test]
    fn test_no_output_is_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = EnvStore::init(temp_dir.path().join("envstore.yml")).unwrap();
        store.add("OTHER", "value").unwrap();

        assert_eq!(extract_output(&store).unwrap(), None);
    }

    #[test]
    fn test_output_is_returned_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        let store = EnvStore::init(temp_dir.path().join("envstore.yml")).unwrap();
        store.add(PLUGIN_OUTPUT_KEY, r#"{"status": "ok"}"#).unwrap();

        assert_eq!(extract_output(&store).unwrap().as_deref(), Some(r#"{"status": "ok"}"#));
    }

    #[test]
    fn test_unreadable_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = EnvStore::init(temp_dir.path().join("envstore.yml")).unwrap();
        std::fs::remove_file(store.path()).unwrap();

        assert!(matches!(extract_output(&store), Err(PluginError::OutputParse { .. })));
    }
}
