//! Isolation subsystem.
//!
//! # Structure
//! ```text
//! DomainRegistry (arena, one per launcher)
//!     ├── "default"   ← units naming no domain
//!     └── "payments"  ← units naming "payments"
//!             ▲
//!             │ DomainId (non-owning)
//! IsolationContext (one per install, owned by the unit)
//!     └── AppBoundary (apps/<unit>/lib, visible to this unit only)
//! ```
//!
//! # Design Decisions
//! - Lookups go local first, then domain
//! - Contexts are discarded on dispose/redeploy, never reused
//! - Unknown domains fail fast at install time

pub mod context;
pub mod domain;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use context::{AppBoundary, IsolationContext, IsolationContextFactory};
pub use domain::{DomainBoundary, DomainId, DomainRegistry, DEFAULT_DOMAIN};

#[derive(Error, Debug)]
pub enum IsolationConfigError {
    #[error("domain '{name}' not found (expected {path})")]
    UnknownDomain { name: String, path: PathBuf },
    #[error("failed to scan libraries in {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
