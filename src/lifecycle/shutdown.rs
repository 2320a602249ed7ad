//! Bounded draining of in-flight work.
//!
//! Work accepted through a [`Dispatcher`] runs on its own task and reports back
//! through a [`Pending`]. When the owning runtime stops, [`ShutdownCoordinator::drain`]
//! closes admission and waits for the in-flight count to reach zero. If the
//! timeout expires first, an abandon signal is broadcast and every caller still
//! waiting on a `Pending` gets [`DispatchError::Timeout`]. The abandoned work
//! itself keeps running until it finishes on its own.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{broadcast, oneshot, Notify};
use tokio::time;

use crate::observability::metrics;

/// Configuration value meaning "wait for in-flight work indefinitely".
pub const NO_TIMEOUT: u64 = 0;

/// How long a stop waits for in-flight work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTimeout {
    Bounded(Duration),
    Unbounded,
}

impl ShutdownTimeout {
    pub fn from_millis(ms: u64) -> Self {
        if ms == NO_TIMEOUT {
            ShutdownTimeout::Unbounded
        } else {
            ShutdownTimeout::Bounded(Duration::from_millis(ms))
        }
    }
}

/// In-flight work was abandoned because the shutdown timeout expired.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unit '{unit}' stopped before in-flight work completed (waited {waited:?})")]
pub struct DispatchTimeoutError {
    pub unit: String,
    pub waited: Duration,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Timeout(#[from] DispatchTimeoutError),
    #[error("unit '{unit}' is not accepting work")]
    Rejected { unit: String },
    #[error("work for unit '{unit}' ended without producing a result")]
    Aborted { unit: String },
}

/// Result of one [`ShutdownCoordinator::drain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Drained,
    Abandoned { pending: usize },
}

struct Inner {
    unit: String,
    timeout: ShutdownTimeout,
    accepting: AtomicBool,
    in_flight: AtomicUsize,
    idle: Notify,
    abandon: broadcast::Sender<()>,
}

/// Tracks in-flight work for one runtime and bounds how long a stop waits for it.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl ShutdownCoordinator {
    pub fn new(unit: impl Into<String>, timeout: ShutdownTimeout) -> Self {
        let (abandon, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(Inner {
                unit: unit.into(),
                timeout,
                accepting: AtomicBool::new(true),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                abandon,
            }),
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            inner: self.inner.clone(),
        }
    }

    pub fn timeout(&self) -> ShutdownTimeout {
        self.inner.timeout
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::SeqCst)
    }

    /// Reopen admission after a previous drain.
    pub fn resume(&self) {
        self.inner.accepting.store(true, Ordering::SeqCst);
    }

    /// Refuse new work without waiting for accepted work.
    pub fn close(&self) {
        self.inner.accepting.store(false, Ordering::SeqCst);
    }

    /// Stop accepting work and wait, at most once and at most for the
    /// configured timeout, for accepted work to finish.
    pub async fn drain(&self) -> DrainOutcome {
        self.close();
        let started = Instant::now();

        let outcome = match self.inner.timeout {
            ShutdownTimeout::Unbounded => {
                self.wait_idle().await;
                DrainOutcome::Drained
            }
            ShutdownTimeout::Bounded(limit) => match time::timeout(limit, self.wait_idle()).await {
                Ok(()) => DrainOutcome::Drained,
                Err(_) => {
                    let pending = self.in_flight();
                    // No receivers just means nobody is waiting on a result.
                    let _ = self.inner.abandon.send(());
                    tracing::warn!(
                        unit = %self.inner.unit,
                        pending,
                        timeout_ms = limit.as_millis() as u64,
                        "Shutdown timeout expired, abandoning in-flight work"
                    );
                    DrainOutcome::Abandoned { pending }
                }
            },
        };

        tracing::debug!(
            unit = %self.inner.unit,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ?outcome,
            "Drain finished"
        );
        metrics::record_drain(&self.inner.unit, &outcome);
        outcome
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Handle for submitting work to a runtime.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Accept `work` and run it on a new task.
    ///
    /// Fails with [`DispatchError::Rejected`] once the owning runtime has
    /// started draining.
    pub fn submit<F, T>(&self, work: F) -> Result<Pending<T>, DispatchError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        // Count first, then check admission; drain does the reverse, so a
        // submission racing a drain is either rejected or waited for.
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard {
            inner: self.inner.clone(),
        };
        if !self.inner.accepting.load(Ordering::SeqCst) {
            return Err(DispatchError::Rejected {
                unit: self.inner.unit.clone(),
            });
        }

        let abandoned = self.inner.abandon.subscribe();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let output = work.await;
            let _ = tx.send(output);
            drop(guard);
        });

        Ok(Pending {
            result: rx,
            abandoned,
            inner: self.inner.clone(),
        })
    }
}

/// The eventual result of submitted work.
pub struct Pending<T> {
    result: oneshot::Receiver<T>,
    abandoned: broadcast::Receiver<()>,
    inner: Arc<Inner>,
}

impl<T> Pending<T> {
    /// Wait for the result, or for the owning runtime to abandon the work.
    pub async fn wait(mut self) -> Result<T, DispatchError> {
        tokio::select! {
            biased;
            result = &mut self.result => result.map_err(|_| DispatchError::Aborted {
                unit: self.inner.unit.clone(),
            }),
            // Any outcome here means an abandon signal was sent after this
            // work was accepted; the sender lives as long as `inner`.
            _ = self.abandoned.recv() => {
                let waited = match self.inner.timeout {
                    ShutdownTimeout::Bounded(limit) => limit,
                    ShutdownTimeout::Unbounded => Duration::ZERO,
                };
                Err(DispatchTimeoutError {
                    unit: self.inner.unit.clone(),
                    waited,
                }
                .into())
            }
        }
    }
}

struct InFlightGuard {
    inner: Arc<Inner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_from_millis() {
        assert_eq!(ShutdownTimeout::from_millis(NO_TIMEOUT), ShutdownTimeout::Unbounded);
        assert_eq!(
            ShutdownTimeout::from_millis(100),
            ShutdownTimeout::Bounded(Duration::from_millis(100))
        );
    }

    #[tokio::test]
    async fn test_expired_timeout_fails_waiting_callers() {
        let coordinator = ShutdownCoordinator::new("orders", ShutdownTimeout::from_millis(100));
        let pending = coordinator
            .dispatcher()
            .submit(async {
                time::sleep(Duration::from_millis(500)).await;
                "done"
            })
            .unwrap();
        let caller = tokio::spawn(pending.wait());

        let started = Instant::now();
        let outcome = coordinator.drain().await;
        let elapsed = started.elapsed();

        assert_eq!(outcome, DrainOutcome::Abandoned { pending: 1 });
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(400), "drain took {:?}", elapsed);

        let result = caller.await.unwrap();
        assert!(matches!(result, Err(DispatchError::Timeout(ref e)) if e.waited == Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_work_within_timeout_is_drained() {
        let coordinator = ShutdownCoordinator::new("orders", ShutdownTimeout::from_millis(500));
        let pending = coordinator
            .dispatcher()
            .submit(async {
                time::sleep(Duration::from_millis(50)).await;
                42
            })
            .unwrap();
        let caller = tokio::spawn(pending.wait());

        let started = Instant::now();
        assert_eq!(coordinator.drain().await, DrainOutcome::Drained);
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(coordinator.in_flight(), 0);

        assert_eq!(caller.await.unwrap(), Ok(42));
    }

    #[tokio::test]
    async fn test_unbounded_waits_for_completion() {
        let coordinator = ShutdownCoordinator::new("orders", ShutdownTimeout::Unbounded);
        let pending = coordinator
            .dispatcher()
            .submit(async {
                time::sleep(Duration::from_millis(150)).await;
                "late"
            })
            .unwrap();

        assert_eq!(coordinator.drain().await, DrainOutcome::Drained);
        assert_eq!(pending.wait().await, Ok("late"));
    }

    #[tokio::test]
    async fn test_drain_with_nothing_in_flight_returns_immediately() {
        let coordinator = ShutdownCoordinator::new("orders", ShutdownTimeout::from_millis(5_000));
        let started = Instant::now();
        assert_eq!(coordinator.drain().await, DrainOutcome::Drained);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_submissions_rejected_while_drained_until_resumed() {
        let coordinator = ShutdownCoordinator::new("orders", ShutdownTimeout::from_millis(100));
        let dispatcher = coordinator.dispatcher();
        coordinator.drain().await;

        assert!(matches!(
            dispatcher.submit(async { 1 }),
            Err(DispatchError::Rejected { .. })
        ));
        assert_eq!(coordinator.in_flight(), 0);

        coordinator.resume();
        assert_eq!(dispatcher.submit(async { 1 }).unwrap().wait().await, Ok(1));
    }

    #[tokio::test]
    async fn test_panicking_work_is_aborted_not_hung() {
        let coordinator = ShutdownCoordinator::new("orders", ShutdownTimeout::from_millis(100));
        let pending = coordinator
            .dispatcher()
            .submit(async {
                panic!("boom");
            })
            .unwrap();

        let result: Result<(), _> = pending.wait().await;
        assert!(matches!(result, Err(DispatchError::Aborted { .. })));
        assert_eq!(coordinator.drain().await, DrainOutcome::Drained);
    }

    #[tokio::test]
    async fn test_completed_result_wins_over_later_abandon() {
        let coordinator = ShutdownCoordinator::new("orders", ShutdownTimeout::from_millis(50));
        let dispatcher = coordinator.dispatcher();
        let fast = dispatcher.submit(async { "fast" }).unwrap();
        let _slow = dispatcher
            .submit(time::sleep(Duration::from_millis(300)))
            .unwrap();

        // Let the fast task deliver its result before the drain abandons the slow one.
        time::sleep(Duration::from_millis(20)).await;
        assert_eq!(coordinator.drain().await, DrainOutcome::Abandoned { pending: 1 });
        assert_eq!(fast.wait().await, Ok("fast"));
    }
}
