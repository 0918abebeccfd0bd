//! Configuration Record

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use tracing::Level;

/// The merged configuration record for one mail platform process.
///
/// Every field is optional on disk; absent keys take their zero value.
/// Unknown keys in fragments are ignored so older processes tolerate newer
/// fragments. Records are immutable once published by the snapshot store;
/// consumers hold an `Arc<Config>` and never observe in-place mutation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub log_format: String,

    pub server_id: String,
    pub server_jwt: String,
    pub instance_hostname: String,
    pub instance_email: String,
    pub instance_mode: String,

    pub port_auth: u16,
    pub port_forwarding: u16,
    pub port_maildb: u16,
    pub port_mailout: u16,
    pub port_webhook: u16,
    pub port_frontline_smtp: u16,
    pub port_frontline_smtps: u16,

    pub out_smtp_host: String,
    pub out_smtp_username: String,
    pub out_smtp_password: String,
    pub out_smtp_port: u16,
    pub out_dkim_path: String,

    pub log_frontline_error: String,
    pub log_frontline_http_access: String,
    pub log_frontline_http_error: String,

    pub forwarding_loop_detection_count: u32,
    pub forwarding_rate_limiting_count: u32,

    pub maildb_db_path: String,

    pub spam_filter: bool,
}

/// Log output format selected by the `log_format` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    /// Resolve the `log_level` field to a tracing level.
    ///
    /// An absent field defaults to `INFO`. Recognized tokens are `INFO`,
    /// `DEBUG` and `WARN`, exact match. Anything else is a
    /// [`ConfigError::UnrecognizedValue`]; the caller decides whether that
    /// is fatal.
    pub fn log_level(&self) -> Result<Level, ConfigError> {
        match self.log_level.as_str() {
            "" | "INFO" => Ok(Level::INFO),
            "DEBUG" => Ok(Level::DEBUG),
            "WARN" => Ok(Level::WARN),
            other => Err(ConfigError::UnrecognizedValue {
                field: "log_level",
                value: other.to_string(),
            }),
        }
    }

    /// Resolve the `log_format` field. Defaults to text output.
    pub fn log_format(&self) -> Result<LogFormat, ConfigError> {
        match self.log_format.as_str() {
            "" | "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::UnrecognizedValue {
                field: "log_format",
                value: other.to_string(),
            }),
        }
    }

    /// Whether this deployment runs in local mode.
    pub fn is_instance_local(&self) -> bool {
        self.instance_mode == "local"
    }

    /// Serialize the record as a YAML document for diagnostics and CLI
    /// display.
    pub fn pretty_print(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(ConfigError::Serialize)
    }
}
