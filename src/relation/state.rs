//! Per-relation protocol state.
//!
//! # States
//! - triggered: a hook for this relation has run
//! - ready: the Provider has advertised hostname and ports
//! - configured: a config was written (Consumer) or accepted (Provider)
//! - departed: the peer left; terminal until the next join
//!
//! # State Transitions
//! ```text
//! fresh → triggered:           joined / changed
//! triggered → ready:           hostname + ports observed (Consumer) or advertised (Provider)
//! any → configured:            configure() (Consumer) / passed status (Provider)
//! any → departed:              departed, every other flag cleared
//! departed → fresh:            joined
//! ```
//!
//! # Design Decisions
//! - Setters are ignored while departed, so late notifications cannot revive
//!   a torn-down relation
//! - Serializable; persisting it is the host's choice

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolState {
    pub triggered: bool,
    pub ready: bool,
    pub configured: bool,
    pub departed: bool,
}

impl ProtocolState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start over after a departure. Returns true if a reset happened.
    pub fn rejoin(&mut self) -> bool {
        if self.departed {
            *self = Self::default();
            true
        } else {
            false
        }
    }

    /// Set `triggered`. Returns false if ignored because departed.
    pub fn trigger(&mut self) -> bool {
        self.set(|s| s.triggered = true)
    }

    pub fn mark_ready(&mut self) -> bool {
        self.set(|s| s.ready = true)
    }

    pub fn mark_configured(&mut self) -> bool {
        self.set(|s| s.configured = true)
    }

    pub fn clear_configured(&mut self) {
        self.configured = false;
    }

    /// Enter `departed`, clearing everything else.
    pub fn depart(&mut self) {
        *self = Self {
            departed: true,
            ..Self::default()
        };
    }

    pub fn is_departed(&self) -> bool {
        self.departed
    }

    fn set(&mut self, apply: impl FnOnce(&mut Self)) -> bool {
        if self.departed {
            return false;
        }
        apply(self);
        true
    }
}
