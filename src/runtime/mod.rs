//! Runtime subsystem.
//!
//! # Data Flow
//! ```text
//! Descriptor.configuration_builder
//!     → BuilderRegistry::select (explicit name | alias | "auto")
//!     → BuilderRegistry::instantiate (inside the unit's isolation context)
//!     → chain: [PropertiesBuilder, annotations?, primary]
//!     → RuntimeContextFactory::create(chain, UnitOverrides)
//!     → RuntimeContext (start / stop / dispose, notifications, dispatcher)
//! ```
//!
//! # Design Decisions
//! - Builders are named factories, not reflective class lookups
//! - Chain order matters: later builders read properties set by earlier ones
//! - The runtime is a trait so the lifecycle can drive any engine

pub mod builder;
pub mod builders;
pub mod context;

pub use builder::{
    BuilderArgs, BuilderError, BuilderFactory, BuilderRegistry, ConfigurationBuilder, RuntimeConfiguration,
    ANNOTATIONS_BUILDER, ANNOTATIONS_LIBRARY, AUTO_BUILDER, TOML_BUILDER,
};
pub use builders::{AutoBuilder, PropertiesBuilder, TomlBuilder};
pub use context::{
    DefaultRuntime, DefaultRuntimeFactory, RuntimeContext, RuntimeContextFactory, RuntimeError, UnitOverrides,
};
