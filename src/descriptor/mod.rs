//! Deployment descriptors.
//!
//! # Data Flow
//! ```text
//! apps/<unit>/deployment.toml
//!     → service.rs (FileDescriptorService::fetch)
//!     → Descriptor (config resources, builder, properties, domain, redeploy flag)
//!     → LifecycleController::install
//! ```
//!
//! # Design Decisions
//! - A unit without a descriptor file gets the default descriptor
//! - The service is a trait so embedders can source descriptors elsewhere

pub mod schema;
pub mod service;

pub use schema::Descriptor;
pub use service::{DescriptorError, DescriptorService, FileDescriptorService};
