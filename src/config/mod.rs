//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! launcher.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → LauncherConfig (validated, immutable)
//!     → DeploymentEnv built from it, shared via Arc by every unit
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Per-unit settings live in each unit's descriptor, not here

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::LauncherConfig;
pub use schema::ObservabilityConfig;
pub use schema::ReloadConfig;
pub use schema::ShutdownConfig;
