//! Fragment Reading and Merging
//!
//! A process configuration is assembled from YAML fragments living directly
//! inside a `conf.d` directory. Fragments are flat key/value documents;
//! merging flattens all top-level keys into one record with the last fragment
//! winning on overlap.

use super::Config;
use crate::error::ConfigError;
use serde_yaml::{Mapping, Value};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Subdirectory of the platform root that holds configuration fragments.
pub const FRAGMENT_DIR: &str = "conf.d";

const FRAGMENT_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// One on-disk fragment: file name plus raw bytes. Ephemeral, lives only for
/// the duration of a single load.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Loads and merges configuration fragments.
pub struct ConfigManager;

impl ConfigManager {
    /// The fragment directory under a platform root path.
    pub fn fragment_dir(root: &Path) -> PathBuf {
        root.join(FRAGMENT_DIR)
    }

    /// Whether a path names a configuration fragment.
    pub fn is_fragment_path(path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .map(|ext| FRAGMENT_EXTENSIONS.contains(&ext))
            .unwrap_or(false)
    }

    /// Read every fragment directly inside `dir`, in ascending file-name
    /// order.
    ///
    /// Directory listing order is filesystem-defined, so fragments are sorted
    /// by name to make the last-wins merge deterministic across platforms.
    /// Subdirectories and files with other extensions are ignored; there is
    /// no recursion.
    pub fn read_fragments(dir: &Path) -> Result<Vec<Fragment>, ConfigError> {
        let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::io(dir, e))?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::io(dir, e))?;
            let path = entry.path();
            if path.is_file() && Self::is_fragment_path(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut fragments = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = std::fs::read(&path).map_err(|e| ConfigError::io(&path, e))?;
            let name = path
                .file_name()
                .and_then(OsStr::to_str)
                .unwrap_or_default()
                .to_string();
            debug!(fragment = %name, size = bytes.len(), "read config fragment");
            fragments.push(Fragment { name, bytes });
        }

        Ok(fragments)
    }

    /// Merge ordered fragments into one configuration record.
    ///
    /// Each fragment must be a flat YAML mapping (an empty fragment is
    /// allowed and contributes nothing). Top-level keys are folded in
    /// fragment order, later fragments overriding earlier ones on duplicate
    /// keys. Unknown keys survive the fold but are dropped by the typed
    /// decode; a type mismatch on a known key fails the whole merge.
    pub fn merge(fragments: &[Fragment]) -> Result<Config, ConfigError> {
        let mut merged = Mapping::new();

        for fragment in fragments {
            let value: Value =
                serde_yaml::from_slice(&fragment.bytes).map_err(|e| ConfigError::Parse {
                    name: fragment.name.clone(),
                    source: e,
                })?;

            match value {
                Value::Null => {}
                Value::Mapping(mapping) => {
                    for (key, value) in mapping {
                        merged.insert(key, value);
                    }
                }
                _ => {
                    return Err(ConfigError::NotAMapping {
                        name: fragment.name.clone(),
                    })
                }
            }
        }

        serde_yaml::from_value(Value::Mapping(merged)).map_err(ConfigError::Decode)
    }

    /// Read and merge all fragments in `dir`.
    ///
    /// All-or-nothing: any unreadable or malformed fragment fails the whole
    /// load and the caller keeps whatever record it already had.
    pub fn load_from_dir(dir: &Path) -> Result<Config, ConfigError> {
        let fragments = Self::read_fragments(dir)?;
        Self::merge(&fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fragment(name: &str, content: &str) -> Fragment {
        Fragment {
            name: name.to_string(),
            bytes: content.as_bytes().to_vec(),
        }
    }

    #[test]
    fn merge_unions_disjoint_fragments() {
        let fragments = vec![
            fragment("a.yml", "instance_hostname: \"mx1.example.com\"\n"),
            fragment("b.yml", "port_auth: 8080\n"),
            fragment("c.yml", "spam_filter: true\n"),
        ];

        let config = ConfigManager::merge(&fragments).unwrap();
        assert_eq!(config.instance_hostname, "mx1.example.com");
        assert_eq!(config.port_auth, 8080);
        assert!(config.spam_filter);
    }

    #[test]
    fn merge_last_fragment_wins_on_duplicate_key() {
        let fragments = vec![
            fragment("a.yml", "port_auth: 8080\n"),
            fragment("b.yml", "port_auth: 9090\n"),
        ];
        let config = ConfigManager::merge(&fragments).unwrap();
        assert_eq!(config.port_auth, 9090);

        // Reversed order reverses the winner.
        let reversed = vec![
            fragment("b.yml", "port_auth: 9090\n"),
            fragment("a.yml", "port_auth: 8080\n"),
        ];
        let config = ConfigManager::merge(&reversed).unwrap();
        assert_eq!(config.port_auth, 8080);
    }

    #[test]
    fn merge_ignores_unknown_keys() {
        let fragments = vec![fragment(
            "a.yml",
            "port_auth: 8080\nsome_future_key: \"whatever\"\n",
        )];
        let config = ConfigManager::merge(&fragments).unwrap();
        assert_eq!(config.port_auth, 8080);
    }

    #[test]
    fn merge_rejects_malformed_yaml() {
        let fragments = vec![fragment("bad.yml", "this is : not : yaml [[[")];
        let err = ConfigManager::merge(&fragments).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn merge_rejects_type_mismatch() {
        let fragments = vec![fragment("a.yml", "port_auth: \"not a port\"\n")];
        let err = ConfigManager::merge(&fragments).unwrap_err();
        assert!(matches!(err, ConfigError::Decode(_)));
    }

    #[test]
    fn merge_rejects_non_mapping_fragment() {
        let fragments = vec![fragment("list.yml", "- a\n- b\n")];
        let err = ConfigManager::merge(&fragments).unwrap_err();
        assert!(matches!(err, ConfigError::NotAMapping { .. }));
    }

    #[test]
    fn merge_allows_empty_fragment() {
        let fragments = vec![fragment("empty.yml", ""), fragment("a.yml", "port_auth: 1\n")];
        let config = ConfigManager::merge(&fragments).unwrap();
        assert_eq!(config.port_auth, 1);
    }

    #[test]
    fn empty_fragment_set_yields_defaults() {
        let config = ConfigManager::merge(&[]).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn read_fragments_sorted_by_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.yml"), "port_auth: 9090\n").unwrap();
        fs::write(dir.path().join("a.yml"), "port_auth: 8080\n").unwrap();

        let fragments = ConfigManager::read_fragments(dir.path()).unwrap();
        let names: Vec<&str> = fragments.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.yml", "b.yml"]);

        let config = ConfigManager::merge(&fragments).unwrap();
        assert_eq!(config.port_auth, 9090);
    }

    #[test]
    fn read_fragments_skips_other_entries() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.yml"), "port_auth: 8080\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "port_auth: 1\n").unwrap();
        fs::write(dir.path().join("README"), "hello\n").unwrap();
        fs::create_dir(dir.path().join("sub.yml")).unwrap();

        let fragments = ConfigManager::read_fragments(dir.path()).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].name, "a.yml");
    }

    #[test]
    fn read_fragments_missing_dir_is_io_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("conf.d");
        let err = ConfigManager::read_fragments(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn reload_is_idempotent() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("a.yml"),
            "instance_hostname: \"mx1\"\nport_auth: 8080\n",
        )
        .unwrap();
        fs::write(dir.path().join("b.yml"), "spam_filter: true\n").unwrap();

        let first = ConfigManager::load_from_dir(dir.path()).unwrap();
        let second = ConfigManager::load_from_dir(dir.path()).unwrap();
        assert_eq!(first, second);
    }
}
