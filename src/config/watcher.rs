//! Configuration Change Watcher
//!
//! Watches the fragment directory for filesystem events and re-runs the
//! read+merge+publish sequence on every relevant change. A failed reload
//! (unreadable or malformed fragment) never stops the watcher and never
//! touches the published snapshot.

use super::{ConfigManager, ConfigStore};
use crate::config::Config;
use crate::error::ConfigError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info};

/// Broadcast to subscribers after every successful reload.
#[derive(Debug, Clone)]
pub struct ConfigChangeEvent {
    pub config: Arc<Config>,
    pub timestamp: std::time::SystemTime,
    pub fragment_dir: PathBuf,
}

/// Background watcher that keeps a [`ConfigStore`] current with the fragment
/// directory.
///
/// Holds the notify subscription for its whole lifetime; [`stop`] releases
/// the subscription and joins the reload task deterministically.
///
/// [`stop`]: ConfigWatcher::stop
pub struct ConfigWatcher {
    change_tx: broadcast::Sender<ConfigChangeEvent>,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Open a watch subscription on `fragment_dir` and spawn the reload
    /// loop.
    ///
    /// Failure to open the subscription is reported synchronously; a process
    /// must not believe it is watching when it is not. The caller may choose
    /// to continue with its startup-loaded configuration, degraded to no hot
    /// reload.
    pub fn spawn(fragment_dir: PathBuf, store: Arc<ConfigStore>) -> Result<Self, ConfigError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (change_tx, _) = broadcast::channel(16);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        // The notify callback runs on notify's own thread; it only forwards
        // into the channel so the async loop does all real work.
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = event_tx.send(res);
            },
            notify::Config::default(),
        )?;
        watcher.watch(&fragment_dir, RecursiveMode::NonRecursive)?;
        info!(dir = %fragment_dir.display(), "watching fragment directory for changes");

        let task = tokio::spawn(Self::run(
            fragment_dir,
            store,
            event_rx,
            change_tx.clone(),
            shutdown_rx,
        ));

        Ok(Self {
            change_tx,
            shutdown_tx,
            task,
            _watcher: watcher,
        })
    }

    /// Subscribe to successful-reload notifications.
    pub fn subscribe(&self) -> BroadcastStream<ConfigChangeEvent> {
        BroadcastStream::new(self.change_tx.subscribe())
    }

    /// Stop watching: unblocks the event wait, joins the reload task and
    /// releases the notify subscription.
    pub async fn stop(self) {
        let Self {
            shutdown_tx,
            task,
            _watcher,
            ..
        } = self;
        let _ = shutdown_tx.send(());
        let _ = task.await;
        drop(_watcher);
    }

    async fn run(
        fragment_dir: PathBuf,
        store: Arc<ConfigStore>,
        mut event_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
        change_tx: broadcast::Sender<ConfigChangeEvent>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("config watcher shutting down");
                    break;
                }
                received = event_rx.recv() => {
                    match received {
                        Some(Ok(event)) => {
                            if !Self::is_relevant(&event) {
                                debug!(kind = ?event.kind, "ignoring filesystem event");
                                continue;
                            }
                            debug!(?event, "detected config change; reloading");
                            Self::reload(&fragment_dir, &store, &change_tx).await;
                        }
                        Some(Err(e)) => {
                            // Per-event watch error; the subscription itself
                            // is still alive.
                            error!("error while watching fragments: {e}");
                        }
                        None => {
                            error!(
                                dir = %fragment_dir.display(),
                                "watch subscription closed; hot reload disabled, \
                                 keeping last-good configuration"
                            );
                            break;
                        }
                    }
                }
            }
        }
    }

    /// A reload is warranted for create/modify/remove events touching a
    /// fragment file. Access notifications and editor noise on other files
    /// are skipped; actual fragment bursts each trigger their own full
    /// reload (no debouncing, directories are small).
    fn is_relevant(event: &Event) -> bool {
        let kind_matches = matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        );
        kind_matches
            && event
                .paths
                .iter()
                .any(|p| ConfigManager::is_fragment_path(p))
    }

    async fn reload(
        fragment_dir: &Path,
        store: &ConfigStore,
        change_tx: &broadcast::Sender<ConfigChangeEvent>,
    ) {
        match ConfigManager::load_from_dir(fragment_dir) {
            Ok(config) => {
                store.publish(config.clone()).await;
                info!("configuration reloaded");

                let event = ConfigChangeEvent {
                    config: Arc::new(config),
                    timestamp: std::time::SystemTime::now(),
                    fragment_dir: fragment_dir.to_path_buf(),
                };
                // No subscribers is fine; the store is already updated.
                let _ = change_tx.send(event);
            }
            Err(e) => {
                // Failure isolation: log, keep the previous snapshot, keep
                // watching.
                error!("could not reload config: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn spawn_fails_on_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("conf.d");
        let store = Arc::new(ConfigStore::new(Config::default()));

        let err = ConfigWatcher::spawn(missing, store).err().unwrap();
        assert!(matches!(err, ConfigError::Subscription(_)));
    }

    #[tokio::test]
    async fn stop_releases_subscription() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.yml"), "port_auth: 8080\n").unwrap();
        let store = Arc::new(ConfigStore::new(Config::default()));

        let watcher = ConfigWatcher::spawn(dir.path().to_path_buf(), store).unwrap();
        watcher.stop().await;
    }

    #[test]
    fn relevance_filter() {
        let touch = |kind, path: &str| Event {
            kind,
            paths: vec![PathBuf::from(path)],
            attrs: Default::default(),
        };

        assert!(ConfigWatcher::is_relevant(&touch(
            EventKind::Create(notify::event::CreateKind::File),
            "/etc/mailconf/conf.d/a.yml"
        )));
        assert!(ConfigWatcher::is_relevant(&touch(
            EventKind::Remove(notify::event::RemoveKind::File),
            "/etc/mailconf/conf.d/a.yaml"
        )));
        assert!(!ConfigWatcher::is_relevant(&touch(
            EventKind::Create(notify::event::CreateKind::File),
            "/etc/mailconf/conf.d/notes.txt"
        )));
        assert!(!ConfigWatcher::is_relevant(&touch(
            EventKind::Access(notify::event::AccessKind::Read),
            "/etc/mailconf/conf.d/a.yml"
        )));
    }
}
