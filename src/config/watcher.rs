//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GalfConfig;
use crate::resilience::BreakerRegistry;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GalfConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GalfConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file. Events are handled on notify's own thread.
    ///
    /// Only configs that load and validate are sent; a rejected or empty
    /// file sends nothing.
    ///
    /// Watching stops when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        // A truncating writer is caught mid-write.
                        if std::fs::metadata(&path).is_ok_and(|m| m.len() == 0) {
                            tracing::debug!(path = ?path, "Config file empty, waiting for content");
                            return;
                        }
                        tracing::info!(path = ?path, "Config file change detected, reloading");
                        match load_config(&path) {
                            Ok(new_config) => {
                                let _ = tx.send(new_config);
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Register every breaker command of `config`.
///
/// Commands missing from `config` stay registered.
pub fn apply_circuit_breakers(registry: &BreakerRegistry, config: &GalfConfig) {
    for entry in &config.circuit_breakers {
        registry.configure_command(entry.name.clone(), entry.to_breaker_config());
    }
}

/// Re-register breaker commands for every config received, until the
/// sending side closes.
pub async fn apply_updates(registry: Arc<BreakerRegistry>, mut updates: mpsc::UnboundedReceiver<GalfConfig>) {
    while let Some(config) = updates.recv().await {
        apply_circuit_breakers(&registry, &config);
        tracing::info!(
            circuit_breakers = config.circuit_breakers.len(),
            "Configuration reloaded"
        );
    }
}
