//! Deployment unit launcher library.
//!
//! Hosts independently deployable units, each with its own isolation
//! context, runtime, and optional hot redeploy on config change.

pub mod config;
pub mod descriptor;
pub mod isolation;
pub mod lifecycle;
pub mod notification;
pub mod observability;
pub mod runtime;
pub mod supervisor;

pub use config::LauncherConfig;
pub use lifecycle::{DeploymentEnv, DeploymentUnit, LifecycleController, ShutdownCoordinator};
pub use supervisor::UnitSupervisor;
