//! Configuration Module
//!
//! Fragment loading, merging, snapshot management and hot reload.

pub mod manager;
pub mod store;
pub mod types;
pub mod watcher;
pub mod writer;

pub use manager::{ConfigManager, Fragment, FRAGMENT_DIR};
pub use store::ConfigStore;
pub use types::{Config, LogFormat};
pub use watcher::{ConfigChangeEvent, ConfigWatcher};
pub use writer::FragmentWriter;
