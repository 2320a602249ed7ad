//! Config resource watcher for hot redeploy.
//!
//! # Responsibilities
//! - Poll one config resource at a fixed delay
//! - Hand changes to the unit, one at a time
//!
//! # Design Decisions
//! - Fixed delay, not fixed rate: the next poll is scheduled after a tick completes
//! - `cancel` stops issuing ticks; a tick already running finishes
//! - The handler is held weakly so a watcher never keeps its unit alive

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::Instrument;

pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

fn fingerprint(path: &Path) -> Option<Fingerprint> {
    fs::metadata(path).ok().map(|meta| Fingerprint {
        modified: meta.modified().ok(),
        len: meta.len(),
    })
}

/// A file and the last fingerprint observed for it.
#[derive(Debug)]
pub struct WatchedResource {
    path: PathBuf,
    last_seen: Option<Fingerprint>,
}

impl WatchedResource {
    /// Start watching `path` from its current state.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_seen = fingerprint(&path);
        Self { path, last_seen }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record the current fingerprint; true if it differs from the last one.
    pub fn poll(&mut self) -> bool {
        let current = fingerprint(&self.path);
        if current == self.last_seen {
            return false;
        }
        self.last_seen = current;
        true
    }
}

/// Reacts to a detected change of a watched resource.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn on_change(&self, resource: &Path);
}

/// Polls one [`WatchedResource`] on a background task.
pub struct HotReloadWatcher {
    unit: String,
    interval: Duration,
    resource: Mutex<WatchedResource>,
    handler: Weak<dyn ChangeHandler>,
    cancel: watch::Sender<bool>,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl HotReloadWatcher {
    pub fn new(
        unit: impl Into<String>,
        resource: WatchedResource,
        interval: Duration,
        handler: Weak<dyn ChangeHandler>,
    ) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            unit: unit.into(),
            interval,
            resource: Mutex::new(resource),
            handler,
            cancel,
            task: StdMutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Begin polling. Has no effect once cancelled or if already scheduled.
    pub fn schedule(self: &Arc<Self>) {
        if self.is_cancelled() {
            tracing::debug!(unit = %self.unit, "Watcher cancelled, not scheduling");
            return;
        }

        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.is_some() {
            return;
        }

        let span = tracing::info_span!("hot_reload", unit = %self.unit);
        let cancelled = self.cancel.subscribe();
        *task = Some(tokio::spawn(self.clone().run(cancelled).instrument(span)));

        tracing::info!(
            unit = %self.unit,
            interval_ms = self.interval.as_millis() as u64,
            "Hot reload watcher scheduled"
        );
    }

    /// Stop issuing ticks. A tick already running is not interrupted.
    pub fn cancel(&self) {
        if !self.cancel.send_replace(true) {
            tracing::debug!(unit = %self.unit, "Hot reload watcher cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    pub fn is_scheduled(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Whether the polling task is still alive.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// One tick: poll the resource and, on change, run the handler.
    ///
    /// Ticks are serialized; a tick that starts while another is running the
    /// handler waits for it and then sees the already-updated fingerprint.
    pub async fn check(&self) -> bool {
        let mut resource = self.resource.lock().await;
        if !resource.poll() {
            return false;
        }

        let Some(handler) = self.handler.upgrade() else {
            tracing::debug!(unit = %self.unit, "Unit gone, stopping watcher");
            self.cancel();
            return false;
        };

        tracing::info!(unit = %self.unit, resource = %resource.path().display(), "Config change detected, reloading");
        handler.on_change(resource.path()).await;
        true
    }

    async fn run(self: Arc<Self>, mut cancelled: watch::Receiver<bool>) {
        loop {
            if *cancelled.borrow_and_update() {
                break;
            }
            tokio::select! {
                _ = time::sleep(self.interval) => {}
                _ = cancelled.changed() => {}
            }
            if *cancelled.borrow() {
                break;
            }
            self.check().await;
        }
        tracing::debug!("Hot reload watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl ChangeHandler for Counting {
        async fn on_change(&self, _resource: &Path) {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn watcher(path: &Path, handler: &Arc<Counting>, interval: Duration) -> Arc<HotReloadWatcher> {
        let handler: Arc<dyn ChangeHandler> = handler.clone();
        Arc::new(HotReloadWatcher::new(
            "orders",
            WatchedResource::new(path),
            interval,
            Arc::downgrade(&handler),
        ))
    }

    #[test]
    fn test_resource_poll_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.toml");
        fs::write(&path, "a = 1").unwrap();

        let mut resource = WatchedResource::new(&path);
        assert!(!resource.poll());

        fs::write(&path, "a = 12345").unwrap();
        assert!(resource.poll());
        assert!(!resource.poll());

        fs::remove_file(&path).unwrap();
        assert!(resource.poll());
    }

    #[tokio::test]
    async fn test_overlapping_ticks_trigger_one_handler_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.toml");
        fs::write(&path, "a = 1").unwrap();

        let handler = Arc::new(Counting {
            delay: Duration::from_millis(200),
            ..Counting::default()
        });
        let watcher = watcher(&path, &handler, DEFAULT_RELOAD_INTERVAL);

        fs::write(&path, "a = 1000").unwrap();
        let (first, second) = tokio::join!(watcher.check(), watcher.check());

        assert!(first ^ second);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(handler.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scheduled_watcher_polls_and_cancel_stops_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.toml");
        fs::write(&path, "a = 1").unwrap();

        let handler = Arc::new(Counting::default());
        let watcher = watcher(&path, &handler, Duration::from_millis(20));
        watcher.schedule();
        assert!(watcher.is_scheduled());

        fs::write(&path, "a = 22").unwrap();
        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        watcher.cancel();
        time::sleep(Duration::from_millis(50)).await;
        assert!(!watcher.is_running());

        fs::write(&path, "a = 333").unwrap();
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_lets_running_tick_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.toml");
        fs::write(&path, "a = 1").unwrap();

        let handler = Arc::new(Counting {
            delay: Duration::from_millis(200),
            ..Counting::default()
        });
        let watcher = watcher(&path, &handler, Duration::from_millis(10));
        watcher.schedule();

        fs::write(&path, "a = 22").unwrap();
        // Wait until the handler is running, then cancel underneath it.
        while handler.active.load(Ordering::SeqCst) == 0 {
            time::sleep(Duration::from_millis(5)).await;
        }
        watcher.cancel();
        assert!(watcher.is_running());

        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert!(!watcher.is_running());
    }

    #[tokio::test]
    async fn test_cancelled_watcher_cannot_be_scheduled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.toml");
        fs::write(&path, "a = 1").unwrap();

        let handler = Arc::new(Counting::default());
        let watcher = watcher(&path, &handler, Duration::from_millis(10));
        watcher.cancel();
        watcher.schedule();
        assert!(!watcher.is_scheduled());
    }

    #[tokio::test]
    async fn test_dropped_handler_stops_watcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.toml");
        fs::write(&path, "a = 1").unwrap();

        let handler = Arc::new(Counting::default());
        let watcher = watcher(&path, &handler, Duration::from_millis(10));
        drop(handler);

        fs::write(&path, "a = 22").unwrap();
        assert!(!watcher.check().await);
        assert!(watcher.is_cancelled());
    }
}
