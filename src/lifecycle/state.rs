//! Deployment unit state machine.
//!
//! # States
//! ```text
//! Uninstalled → Installed → Initialized → Started → Stopped → Disposed
//!                   ▲                                            │
//!                   └──────────── Redeploying ───────────────────┘
//! ```
//!
//! # Design Decisions
//! - `Redeploying` is transient: redeploy walks dispose, install, init and start
//! - A failed operation leaves the last state reached
//! - State changes are logged and counted

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    Uninstalled,
    Installed,
    Initialized,
    Started,
    Stopped,
    Disposed,
    Redeploying,
}

impl UnitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitState::Uninstalled => "uninstalled",
            UnitState::Installed => "installed",
            UnitState::Initialized => "initialized",
            UnitState::Started => "started",
            UnitState::Stopped => "stopped",
            UnitState::Disposed => "disposed",
            UnitState::Redeploying => "redeploying",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
