//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Deploy (controller.rs):
//!     install → init → start → marker file written
//!
//! Hot redeploy (watcher.rs → unit.rs):
//!     STARTED → watcher scheduled → resource changed → on_change
//!         → dispose → install → init → start (fresh isolation context)
//!
//! Undeploy (controller.rs + shutdown.rs):
//!     STOPPING → watcher cancelled → drain in-flight work (bounded) → dispose
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → undeploy every unit
//! ```
//!
//! # Design Decisions
//! - One controller per unit; lifecycle calls on it are serialized
//! - Redeploy always rebuilds from scratch, nothing is reused
//! - Shutdown has a timeout: callers still waiting get a timeout error

pub mod controller;
pub mod env;
pub mod error;
pub mod shutdown;
pub mod signals;
pub mod state;
pub mod unit;
pub mod watcher;

pub use controller::LifecycleController;
pub use env::{DeploymentEnv, ANCHOR_FILE_BLURB, ANCHOR_SUFFIX, UNIT_HOME_PROPERTY};
pub use error::{DeploymentError, InitError, InstallError, StartError, StopError};
pub use shutdown::{
    DispatchError, DispatchTimeoutError, Dispatcher, DrainOutcome, Pending, ShutdownCoordinator, ShutdownTimeout,
    NO_TIMEOUT,
};
pub use state::UnitState;
pub use unit::DeploymentUnit;
pub use watcher::{ChangeHandler, HotReloadWatcher, WatchedResource, DEFAULT_RELOAD_INTERVAL};
