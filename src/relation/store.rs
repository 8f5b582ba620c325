//! Relation store abstraction.
//!
//! The store itself belongs to the host environment. This module only names
//! what the protocol needs from it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of one relation instance, e.g. `reverseproxy:3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(String);

impl RelationId {
    /// Build the conventional `<name>:<id>` form.
    pub fn new(name: &str, id: u32) -> Self {
        Self(format!("{}:{}", name, id))
    }

    /// The id as written on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of one unit, e.g. `myapp/0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Wrap a unit name as given by the host. The shape is not checked; see
    /// [`UnitId::is_well_formed`].
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The full unit name, e.g. `myapp/0`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Application part of the id (`myapp` for `myapp/0`).
    pub fn app(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }

    /// True for the `<app>/<number>` shape.
    pub fn is_well_formed(&self) -> bool {
        match self.0.split_once('/') {
            Some((app, number)) => {
                !app.is_empty() && !number.is_empty() && number.chars().all(|c| c.is_ascii_digit())
            }
            None => false,
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UnitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One remote unit on one relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerEndpoint {
    pub relation: RelationId,
    pub unit: UnitId,
}

impl PeerEndpoint {
    /// Pair a relation with the remote unit seen on it.
    pub fn new(relation: RelationId, unit: UnitId) -> Self {
        Self { relation, unit }
    }
}

impl fmt::Display for PeerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.unit, self.relation)
    }
}

/// Errors raised by a relation store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The relation was torn down; the write was not applied.
    #[error("relation {0} no longer exists")]
    RelationGone(RelationId),

    /// Failure reported by the host's store implementation.
    #[error("relation store error: {0}")]
    Backend(String),
}

/// Directional, per-unit key-value store shared between related units.
///
/// `set` writes the local unit's bag, which only the peers can read. `get`
/// reads a peer's bag.
pub trait RelationStore {
    /// Unit this store writes as.
    fn local_unit(&self) -> &UnitId;

    fn get(&self, peer: &PeerEndpoint, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&mut self, relation: &RelationId, key: &str, value: &str) -> Result<(), StoreError>;
}

impl<S: RelationStore + ?Sized> RelationStore for Box<S> {
    fn local_unit(&self) -> &UnitId {
        (**self).local_unit()
    }

    fn get(&self, peer: &PeerEndpoint, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(peer, key)
    }

    fn set(&mut self, relation: &RelationId, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(relation, key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_id_shape() {
        assert!(UnitId::from("myapp/0").is_well_formed());
        assert!(UnitId::from("haproxy/12").is_well_formed());
        assert!(!UnitId::from("myapp").is_well_formed());
        assert!(!UnitId::from("/0").is_well_formed());
        assert!(!UnitId::from("myapp/x").is_well_formed());
        assert_eq!(UnitId::from("myapp/0").app(), "myapp");
    }

    #[test]
    fn test_relation_id_format() {
        assert_eq!(RelationId::new("reverseproxy", 3).as_str(), "reverseproxy:3");
    }
}
