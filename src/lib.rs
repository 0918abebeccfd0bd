//! Mailconf Library
//!
//! Live-reloading configuration store for the mail platform. Every platform
//! process merges the YAML fragments under `<root>/conf.d` into one typed
//! [`Config`] record and keeps it current as fragments change on disk.
//!
//! A typical process loads once at startup (fatal on failure), then spawns
//! the [`ConfigWatcher`] for the rest of its lifetime:
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use mailconf::config::{ConfigManager, ConfigStore, ConfigWatcher};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let dir = ConfigManager::fragment_dir(Path::new("/etc/mailconf"));
//! let initial = ConfigManager::load_from_dir(&dir)?;
//! let store = Arc::new(ConfigStore::new(initial));
//! let watcher = ConfigWatcher::spawn(dir, store.clone())?;
//!
//! let config = store.current().await;
//! println!("auth port: {}", config.port_auth);
//! # watcher.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod shutdown;

pub use config::{Config, ConfigStore, ConfigWatcher, FragmentWriter};
pub use error::ConfigError;

/// Common result type for the binary and service plumbing.
pub type Result<T> = anyhow::Result<T>;
