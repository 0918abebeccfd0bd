//! Named Fragment Writer
//!
//! Writes the small set of fragments the platform itself maintains
//! (server JWT, instance identity, DKIM key path). Each write fully replaces
//! its own named file and then eagerly patches the in-memory snapshot, so
//! the calling process observes its own write immediately instead of racing
//! the asynchronous watcher.

use super::ConfigStore;
use crate::error::ConfigError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Fragment holding the server authentication token.
pub const SERVER_JWT_FRAGMENT: &str = "server-jwt.yml";
/// Fragment holding instance identity (mode, hostname, contact email).
pub const INSTANCE_FRAGMENT: &str = "instance.yml";
/// Fragment holding the DKIM signing key path.
pub const DKIM_FRAGMENT: &str = "dkim.yml";

/// Writes named fragments and keeps the snapshot read-your-writes
/// consistent.
pub struct FragmentWriter {
    fragment_dir: PathBuf,
    store: Arc<ConfigStore>,
}

impl FragmentWriter {
    pub fn new(fragment_dir: PathBuf, store: Arc<ConfigStore>) -> Self {
        Self {
            fragment_dir,
            store,
        }
    }

    /// Persist the server JWT and patch the snapshot.
    pub async fn write_server_jwt(&self, jwt: &str) -> Result<(), ConfigError> {
        self.write_fragment(SERVER_JWT_FRAGMENT, &[("server_jwt", jwt)])?;
        self.store
            .patch(|c| c.server_jwt = jwt.to_string())
            .await;
        Ok(())
    }

    /// Persist instance identity and patch the snapshot.
    pub async fn write_instance(
        &self,
        mode: &str,
        hostname: &str,
        email: &str,
    ) -> Result<(), ConfigError> {
        self.write_fragment(
            INSTANCE_FRAGMENT,
            &[
                ("instance_mode", mode),
                ("instance_hostname", hostname),
                ("instance_email", email),
            ],
        )?;
        self.store
            .patch(|c| {
                c.instance_mode = mode.to_string();
                c.instance_hostname = hostname.to_string();
                c.instance_email = email.to_string();
            })
            .await;
        Ok(())
    }

    /// Persist the DKIM signing key path and patch the snapshot.
    pub async fn write_dkim(&self, key_path: &str) -> Result<(), ConfigError> {
        self.write_fragment(DKIM_FRAGMENT, &[("out_dkim_path", key_path)])?;
        self.store
            .patch(|c| c.out_dkim_path = key_path.to_string())
            .await;
        Ok(())
    }

    /// Serialize `key: "value"` lines and overwrite the named fragment.
    ///
    /// Values are written as YAML double-quoted scalars, so arbitrary token
    /// content written here always reads back on the next reload. Only this
    /// writer's own file is ever touched; sibling fragments are left alone.
    fn write_fragment(&self, name: &str, pairs: &[(&str, &str)]) -> Result<(), ConfigError> {
        let mut data = String::new();
        for (key, value) in pairs {
            data.push_str(&format!("{key}: {}\n", yaml_quote(value)));
        }

        let path = self.fragment_dir.join(name);
        std::fs::write(&path, data).map_err(|e| ConfigError::io(&path, e))?;
        debug!(fragment = name, "wrote config fragment");
        Ok(())
    }
}

/// Quote a string as a YAML double-quoted scalar.
///
/// Quotes, backslashes and the common whitespace escapes use their short
/// forms; remaining C0 controls and DEL use YAML's `\uXXXX` form, which is
/// not what Rust's `{:?}` formatting would emit.
fn yaml_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
