//! Relation store adapter with change detection.
//!
//! # Responsibilities
//! - Wrap the host's `RelationStore` for the drivers
//! - Answer "is this value new since the last observation" per scoped key
//! - Forget a relation's observations when it departs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::relation::store::{PeerEndpoint, RelationId, RelationStore, StoreError, UnitId};

/// Last observed value per key.
///
/// Serializable so a host that has to survive restarts can persist it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTracker {
    seen: BTreeMap<String, String>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` under `key` and report whether it differs from the
    /// previous observation. The first observation of a key is a change.
    pub fn changed(&mut self, key: &str, value: &str) -> bool {
        match self.seen.get(key) {
            Some(previous) if previous == value => false,
            _ => {
                self.seen.insert(key.to_string(), value.to_string());
                true
            }
        }
    }

    /// True if `value` would count as a change, without recording it.
    pub fn differs(&self, key: &str, value: &str) -> bool {
        self.seen.get(key).map(String::as_str) != Some(value)
    }

    pub fn forget(&mut self, key: &str) {
        self.seen.remove(key);
    }

    /// Drop every key starting with `prefix`.
    pub fn forget_prefix(&mut self, prefix: &str) {
        self.seen.retain(|key, _| !key.starts_with(prefix));
    }

    /// Drop every key for which `matches` is true.
    pub fn forget_where(&mut self, mut matches: impl FnMut(&str) -> bool) {
        self.seen.retain(|key, _| !matches(key.as_str()));
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Key under which an observation of `key` on `relation` is tracked.
///
/// `unit` is `None` for keys the local unit writes itself.
pub fn change_key(relation: &RelationId, unit: Option<&UnitId>, key: &str) -> String {
    match unit {
        Some(unit) => format!("{}|{}|{}", relation, unit, key),
        None => format!("{}|-|{}", relation, key),
    }
}

/// Store access for one driver.
#[derive(Debug)]
pub struct RelationAdapter<S> {
    store: S,
    tracker: ChangeTracker,
}

impl<S: RelationStore> RelationAdapter<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            tracker: ChangeTracker::new(),
        }
    }

    /// Rebuild an adapter with a previously persisted tracker.
    pub fn with_tracker(store: S, tracker: ChangeTracker) -> Self {
        Self { store, tracker }
    }

    pub fn local_unit(&self) -> &UnitId {
        self.store.local_unit()
    }

    /// Read `key` from a peer's bag.
    pub fn get(&self, peer: &PeerEndpoint, key: &str) -> Result<Option<String>, StoreError> {
        self.store.get(peer, key)
    }

    /// Write `key` into the local bag on `relation`.
    pub fn set(&mut self, relation: &RelationId, key: &str, value: &str) -> Result<(), StoreError> {
        self.store.set(relation, key, value)
    }

    /// See [`ChangeTracker::changed`].
    pub fn changed(&mut self, key: &str, value: &str) -> bool {
        self.tracker.changed(key, value)
    }

    /// See [`ChangeTracker::differs`].
    pub fn differs(&self, key: &str, value: &str) -> bool {
        self.tracker.differs(key, value)
    }

    pub fn forget(&mut self, key: &str) {
        self.tracker.forget(key);
    }

    /// Forget every observation made on `relation`.
    pub fn forget_relation(&mut self, relation: &RelationId) {
        self.tracker.forget_prefix(&format!("{}|", relation));
    }

    /// Forget what was observed from `unit` on `relation`.
    pub fn forget_unit(&mut self, relation: &RelationId, unit: &UnitId) {
        self.tracker.forget_prefix(&format!("{}|{}|", relation, unit));
    }

    /// Forget `key` as observed from every peer on `relation`.
    pub fn forget_peer_key(&mut self, relation: &RelationId, key: &str) {
        let prefix = format!("{}|", relation);
        let suffix = format!("|{}", key);
        self.tracker
            .forget_where(|k| k.starts_with(&prefix) && k.ends_with(&suffix) && !k.contains("|-|"));
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
