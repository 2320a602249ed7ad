//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! LifecycleController, HotReloadWatcher, ShutdownCoordinator produce:
//!     → logging.rs (structured log events, spans per isolation context)
//!     → metrics.rs (transition, redeploy and drain counters)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
