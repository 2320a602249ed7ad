//! Lifecycle event types.

use std::fmt;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEventKind {
    Starting,
    Started,
    Stopping,
    Stopped,
    Disposing,
    Disposed,
}

impl fmt::Display for LifecycleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleEventKind::Starting => "starting",
            LifecycleEventKind::Started => "started",
            LifecycleEventKind::Stopping => "stopping",
            LifecycleEventKind::Stopped => "stopped",
            LifecycleEventKind::Disposing => "disposing",
            LifecycleEventKind::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// A state change of one unit's runtime.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub kind: LifecycleEventKind,
    pub unit: String,
    pub timestamp: SystemTime,
}

impl LifecycleEvent {
    pub fn new(kind: LifecycleEventKind, unit: impl Into<String>) -> Self {
        Self {
            kind,
            unit: unit.into(),
            timestamp: SystemTime::now(),
        }
    }
}
