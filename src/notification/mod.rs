//! Lifecycle notifications.
//!
//! # Data Flow
//! ```text
//! RuntimeContext::start/stop/dispose
//!     → NotificationHub::publish(LifecycleEvent)
//!     → every subscribed listener, in subscription order
//!
//! LifecycleController (owner)
//!     → hub.subscribe(listener) → SubscriptionHandle
//!     → handle.unsubscribe() when it no longer wants events
//! ```
//!
//! # Design Decisions
//! - Listeners never unsubscribe themselves; the owner of the handle does
//! - Dropping a handle unsubscribes, so a forgotten handle cannot leak a listener
//! - Publishing is synchronous; listeners must not block

pub mod hub;
pub mod types;

pub use hub::{NotificationHub, SubscriptionHandle};
pub use types::{LifecycleEvent, LifecycleEventKind};
