//! Relation hook notifications.

use std::fmt;

use crate::relation::store::{PeerEndpoint, RelationId, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Joined,
    Changed,
    Departed,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::Joined => "joined",
            HookKind::Changed => "changed",
            HookKind::Departed => "departed",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One notification about a remote unit, as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hook {
    pub kind: HookKind,
    pub peer: PeerEndpoint,
}

impl Hook {
    pub fn new(kind: HookKind, relation: RelationId, unit: UnitId) -> Self {
        Self {
            kind,
            peer: PeerEndpoint::new(relation, unit),
        }
    }

    pub fn joined(relation: RelationId, unit: UnitId) -> Self {
        Self::new(HookKind::Joined, relation, unit)
    }

    pub fn changed(relation: RelationId, unit: UnitId) -> Self {
        Self::new(HookKind::Changed, relation, unit)
    }

    pub fn departed(relation: RelationId, unit: UnitId) -> Self {
        Self::new(HookKind::Departed, relation, unit)
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-relation-{} ({})", self.peer.relation, self.kind, self.peer.unit)
    }
}
