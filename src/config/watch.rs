//! Polls the config file and reports which settings changed.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Config, ConfigKey};

/// A reloaded configuration together with the keys that changed.
#[derive(Debug, Clone)]
pub struct ConfigChange {
    pub config: Config,
    pub keys: Vec<ConfigKey>,
}

impl ConfigChange {
    /// Returns true if any changed key affects the account client.
    pub fn affects_client(&self) -> bool {
        self.keys.iter().any(ConfigKey::affects_client)
    }

    /// Changed keys that only take effect after a restart.
    pub fn restart_keys(&self) -> Vec<ConfigKey> {
        self.keys
            .iter()
            .copied()
            .filter(ConfigKey::requires_restart)
            .collect()
    }

    /// Returns true if `key` is among the changed keys.
    pub fn contains(&self, key: ConfigKey) -> bool {
        self.keys.contains(&key)
    }
}

/// Watches a config file by modification time.
pub struct ConfigWatcher {
    path: PathBuf,
    poll_interval: Duration,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
        }
    }

    /// Spawns the polling task.
    ///
    /// Every successful reload that changes at least one key is sent on the
    /// returned channel. Invalid files are logged and skipped; the last good
    /// configuration stays the comparison base.
    pub fn spawn(
        self,
        initial: Config,
        mut shutdown: watch::Receiver<bool>,
    ) -> (JoinHandle<()>, mpsc::UnboundedReceiver<ConfigChange>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            let mut current = initial;
            let mut last_modified = self.modified();
            let mut interval = tokio::time::interval(self.poll_interval);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown.changed() => break,
                }

                let modified = self.modified();
                if modified == last_modified {
                    continue;
                }
                last_modified = modified;

                let path = self.path.to_string_lossy();
                let reloaded = match Config::load(&path) {
                    Ok(config) => config,
                    Err(e) => {
                        warn!(path = %path, error = %e, "config reload failed");
                        continue;
                    }
                };

                let keys = reloaded.changes_from(&current);
                if keys.is_empty() {
                    debug!(path = %path, "config touched without changes");
                    continue;
                }

                info!(keys = ?keys, "configuration changed");
                current = reloaded.clone();

                if tx.send(ConfigChange { config: reloaded, keys }).is_err() {
                    break;
                }
            }
        });

        (handle, rx)
    }

    fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}
