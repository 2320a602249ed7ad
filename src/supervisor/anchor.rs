//! Marker file watcher for clean undeploys.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::lifecycle::ANCHOR_SUFFIX;

/// Unit name encoded in a marker file path, if it is one.
pub fn unit_from_anchor(path: &Path) -> Option<&str> {
    path.file_name()?
        .to_str()?
        .strip_suffix(ANCHOR_SUFFIX)
        .filter(|unit| !unit.is_empty())
}

/// Watches the apps directory and reports units whose marker file disappeared.
pub struct AnchorWatcher {
    apps_dir: PathBuf,
    removed_tx: mpsc::UnboundedSender<String>,
}

impl AnchorWatcher {
    /// Returns the watcher and a receiver of unit names to undeploy.
    pub fn new(apps_dir: &Path) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (removed_tx, removed_rx) = mpsc::unbounded_channel();

        (
            Self {
                apps_dir: apps_dir.to_path_buf(),
                removed_tx,
            },
            removed_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.removed_tx.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_access() {
                        return;
                    }
                    for path in &event.paths {
                        // Renames and removals both count, as long as the marker is gone.
                        if path.exists() {
                            continue;
                        }
                        if let Some(unit) = unit_from_anchor(path) {
                            tracing::info!(unit = %unit, "Marker file removed, undeploying");
                            let _ = tx.send(unit.to_string());
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.apps_dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.apps_dir, "Marker watcher started");
        Ok(watcher)
    }
}
