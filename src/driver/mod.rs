//! Protocol drivers.
//!
//! # Data Flow
//! ```text
//! Consumer (requires.rs):
//!     configure(requests) → validate all → `config` JSON → own bag
//!     changed hook → hostname/ports → ProxyReady
//!                  → status → ConfigAccepted / ProxyConfigError / MalformedStatus
//!
//! Provider (provides.rs):
//!     advertise(ports, hostname) → hostname/ports → own bag
//!     changed hook → `config` → validate again → Renderer → status → own bag
//! ```
//!
//! # Design Decisions
//! - Hooks are dispatched through a table of `HookKind` → handler function
//! - Each hook runs to completion; there is no internal concurrency
//! - Provider-side validation and render failures become `failed` statuses,
//!   they are never returned as errors
//! - Store failures are returned to the caller and not retried

pub mod events;
pub mod identity;
pub mod provides;
pub mod render;
pub mod requires;

use std::fmt;

use thiserror::Error;

use crate::observability::metrics;
use crate::proxy::ConfigSetError;
use crate::relation::{Hook, HookKind, PeerEndpoint, RelationId, StoreError};

pub use events::{ChannelSink, NotificationSink, ProxyEvent, RecordingSink};
pub use identity::{IdentitySource, StaticIdentity, SystemIdentity};
pub use provides::ProviderDriver;
pub use render::{RenderError, Renderer, StanzaRenderer};
pub use requires::ConsumerDriver;

/// Consumer → Provider key holding the serialized config set.
pub const CONFIG_KEY: &str = "config";
/// Provider → Consumer key holding the proxy hostname.
pub const HOSTNAME_KEY: &str = "hostname";
/// Provider → Consumer key holding the proxy ports.
pub const PORTS_KEY: &str = "ports";

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid proxy config: {0}")]
    Config(#[from] ConfigSetError),

    #[error("failed to encode config payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A hook handler.
pub type Handler<D> = fn(&mut D, &PeerEndpoint) -> Result<(), DriverError>;

/// Maps each hook kind to the handler that reacts to it.
pub struct DispatchTable<D> {
    entries: Vec<(HookKind, Handler<D>)>,
}

impl<D> DispatchTable<D> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register `handler` for `kind`, replacing any earlier registration.
    pub fn on(mut self, kind: HookKind, handler: Handler<D>) -> Self {
        self.entries.retain(|(k, _)| *k != kind);
        self.entries.push((kind, handler));
        self
    }

    pub fn lookup(&self, kind: HookKind) -> Option<Handler<D>> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, handler)| *handler)
    }

    pub fn kinds(&self) -> impl Iterator<Item = HookKind> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }
}

impl<D> Default for DispatchTable<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for DispatchTable<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}

/// One side of the relation, driven by hooks.
pub trait RelationEndpoint: Sized {
    /// Role label for logs and metrics.
    const ROLE: &'static str;

    fn dispatch_table(&self) -> &DispatchTable<Self>;

    /// Run the handler registered for `hook.kind`, if any.
    fn handle(&mut self, hook: &Hook) -> Result<(), DriverError> {
        metrics::record_hook(Self::ROLE, hook.kind);
        let handler = self.dispatch_table().lookup(hook.kind);
        match handler {
            Some(handler) => handler(self, &hook.peer),
            None => {
                tracing::debug!(role = Self::ROLE, hook = %hook, "no handler registered");
                Ok(())
            }
        }
    }
}

/// Error for a write attempted on a relation this driver saw depart.
pub(crate) fn relation_gone(relation: &RelationId) -> DriverError {
    DriverError::Store(StoreError::RelationGone(relation.clone()))
}
