//! Configuration Error Types

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the configuration subsystem.
///
/// Callers are expected to match on the variant to decide severity: a startup
/// load failure is fatal, while the same error during a watcher-triggered
/// reload is logged and recovered.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The fragment directory could not be listed, or a fragment could not be
    /// read or written.
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A fragment contained malformed YAML.
    #[error("failed to parse fragment '{name}': {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A fragment parsed, but its top level is not a flat key/value mapping.
    #[error("fragment '{name}' is not a flat key/value document")]
    NotAMapping { name: String },

    /// The merged document did not decode into the configuration record,
    /// typically a type mismatch on a known key.
    #[error("failed to decode merged configuration: {0}")]
    Decode(#[source] serde_yaml::Error),

    /// The filesystem watch subscription could not be established or broke.
    #[error("config watch subscription error: {0}")]
    Subscription(#[from] notify::Error),

    /// A field with a closed token set held a value outside that set.
    #[error("unrecognized {field} value: '{value}'")]
    UnrecognizedValue { field: &'static str, value: String },

    /// Serializing the current record for display failed.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
