//! Unit supervision.
//!
//! # Data Flow
//! ```text
//! main → UnitSupervisor::deploy(name) for each configured unit
//! AnchorWatcher: <apps>/<unit>-anchor.txt removed → UnitSupervisor::undeploy(name)
//! shutdown signal → UnitSupervisor::shutdown (undeploy all)
//! ```

pub mod anchor;
pub mod deployer;

pub use anchor::{unit_from_anchor, AnchorWatcher};
pub use deployer::UnitSupervisor;
