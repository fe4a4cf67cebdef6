//! Routing file watcher for hot reload.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_routing;
use crate::routing::RoutingTable;

/// A watcher that monitors the routing file for changes.
pub struct RoutingWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<RoutingTable>,
}

impl RoutingWatcher {
    /// Create a new RoutingWatcher.
    ///
    /// Returns the watcher and a receiver for routing table updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<RoutingTable>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for updates to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = %path.display(), "Routing file change detected, reloading");
                        match load_routing(&path) {
                            Ok(table) => {
                                let _ = tx.send(table);
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to reload routing file. Keeping current table.");
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Routing watcher started");
        Ok(watcher)
    }
}
