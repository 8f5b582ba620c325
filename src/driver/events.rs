//! Outward notifications raised by the drivers.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::relation::{RelationId, UnitId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProxyEvent {
    /// A peer unit joined the relation.
    PeerConnected { relation: RelationId, unit: UnitId },

    /// The Provider advertised (new) hostname and ports.
    ProxyReady {
        relation: RelationId,
        hostname: String,
        ports: String,
    },

    /// The Provider applied the config.
    ConfigAccepted {
        relation: RelationId,
        message: Option<String>,
    },

    /// The Provider rejected the config. The host must surface this.
    ProxyConfigError { relation: RelationId, message: String },

    /// The Provider's status value could not be decoded.
    MalformedStatus { relation: RelationId, message: String },
}

impl ProxyEvent {
    pub fn relation(&self) -> &RelationId {
        match self {
            ProxyEvent::PeerConnected { relation, .. }
            | ProxyEvent::ProxyReady { relation, .. }
            | ProxyEvent::ConfigAccepted { relation, .. }
            | ProxyEvent::ProxyConfigError { relation, .. }
            | ProxyEvent::MalformedStatus { relation, .. } => relation,
        }
    }

    /// True for events that report a failure.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ProxyEvent::ProxyConfigError { .. } | ProxyEvent::MalformedStatus { .. }
        )
    }
}

/// Where the host receives [`ProxyEvent`]s. Must not block.
pub trait NotificationSink {
    fn notify(&mut self, event: ProxyEvent);
}

/// Keeps every event, in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Vec<ProxyEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ProxyEvent] {
        &self.events
    }

    /// Take the recorded events, leaving the sink empty.
    pub fn drain(&mut self) -> Vec<ProxyEvent> {
        std::mem::take(&mut self.events)
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&mut self, event: ProxyEvent) {
        self.events.push(event);
    }
}

/// Forwards events over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProxyEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ProxyEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProxyEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&mut self, event: ProxyEvent) {
        if let Err(err) = self.tx.send(event) {
            tracing::warn!(event = ?err.0, "event receiver dropped");
        }
    }
}
