//! In-process relation store.
//!
//! # Responsibilities
//! - Hold one bag per (relation, unit)
//! - Hand out per-unit views that write their own bag and read peers' bags
//! - Track live relations so writes after teardown fail with `RelationGone`
//! - Deliver joined/changed/departed hooks to watching units, one per write,
//!   only between units of different applications

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio::sync::mpsc;

use crate::relation::hook::Hook;
use crate::relation::store::{PeerEndpoint, RelationId, RelationStore, StoreError, UnitId};

#[derive(Debug, Default)]
struct Inner {
    bags: DashMap<(RelationId, UnitId), HashMap<String, String>>,
    live: DashSet<RelationId>,
    members: DashMap<RelationId, BTreeSet<UnitId>>,
    watchers: DashMap<UnitId, mpsc::UnboundedSender<Hook>>,
    writes: AtomicUsize,
}

/// A shared store; clones point at the same bags.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a relation as established. Bags are created lazily on first write.
    pub fn establish(&self, relation: &RelationId) {
        self.inner.live.insert(relation.clone());
    }

    /// Remove a relation, its members and every bag in it.
    pub fn teardown(&self, relation: &RelationId) {
        self.inner.live.remove(relation);
        self.inner.members.remove(relation);
        self.inner.bags.retain(|(rel, _), _| rel != relation);
    }

    pub fn is_live(&self, relation: &RelationId) -> bool {
        self.inner.live.contains(relation)
    }

    /// Subscribe `unit` to hooks about its peers.
    pub fn watch(&self, unit: impl Into<UnitId>) -> mpsc::UnboundedReceiver<Hook> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.watchers.insert(unit.into(), tx);
        rx
    }

    /// Add `unit` to `relation`, establishing it if needed.
    ///
    /// Existing members see a joined hook for `unit`, and `unit` sees one
    /// for each existing member.
    pub fn join(&self, relation: &RelationId, unit: &UnitId) {
        self.establish(relation);
        let existing: Vec<UnitId> = {
            let mut members = self.inner.members.entry(relation.clone()).or_default();
            let existing = members
                .iter()
                .filter(|m| m.app() != unit.app())
                .cloned()
                .collect();
            members.insert(unit.clone());
            existing
        };
        for member in existing {
            self.deliver(&member, Hook::joined(relation.clone(), unit.clone()));
            self.deliver(unit, Hook::joined(relation.clone(), member));
        }
    }

    /// Remove `unit` from `relation`; remaining members see it depart and
    /// `unit` sees every remaining member depart.
    pub fn leave(&self, relation: &RelationId, unit: &UnitId) {
        let remaining: Vec<UnitId> = match self.inner.members.get_mut(relation) {
            Some(mut members) => {
                members.remove(unit);
                members
                    .iter()
                    .filter(|m| m.app() != unit.app())
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        };
        self.inner.bags.remove(&(relation.clone(), unit.clone()));
        for member in remaining {
            self.deliver(&member, Hook::departed(relation.clone(), unit.clone()));
            self.deliver(unit, Hook::departed(relation.clone(), member));
        }
    }

    /// A view that writes as `unit`.
    pub fn view(&self, unit: impl Into<UnitId>) -> UnitView {
        UnitView {
            store: self.clone(),
            unit: unit.into(),
        }
    }

    /// Snapshot of one bag.
    pub fn bag(&self, relation: &RelationId, unit: &UnitId) -> HashMap<String, String> {
        self.inner
            .bags
            .get(&(relation.clone(), unit.clone()))
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::Relaxed)
    }

    fn deliver(&self, unit: &UnitId, hook: Hook) {
        if let Some(tx) = self.inner.watchers.get(unit) {
            if tx.send(hook).is_err() {
                tracing::debug!(unit = %unit, "hook receiver dropped");
            }
        }
    }

    fn notify_write(&self, relation: &RelationId, writer: &UnitId) {
        let peers: Vec<UnitId> = self
            .inner
            .members
            .get(relation)
            .map(|m| m.iter().filter(|u| u.app() != writer.app()).cloned().collect())
            .unwrap_or_default();
        for peer in peers {
            self.deliver(&peer, Hook::changed(relation.clone(), writer.clone()));
        }
    }
}

/// One unit's access to a [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct UnitView {
    store: MemoryStore,
    unit: UnitId,
}

impl RelationStore for UnitView {
    fn local_unit(&self) -> &UnitId {
        &self.unit
    }

    fn get(&self, peer: &PeerEndpoint, key: &str) -> Result<Option<String>, StoreError> {
        // Own writes are for the peers only.
        if peer.unit == self.unit {
            return Ok(None);
        }
        Ok(self
            .store
            .inner
            .bags
            .get(&(peer.relation.clone(), peer.unit.clone()))
            .and_then(|bag| bag.get(key).cloned()))
    }

    fn set(&mut self, relation: &RelationId, key: &str, value: &str) -> Result<(), StoreError> {
        if !self.store.is_live(relation) {
            return Err(StoreError::RelationGone(relation.clone()));
        }
        self.store
            .inner
            .bags
            .entry((relation.clone(), self.unit.clone()))
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.store.inner.writes.fetch_add(1, Ordering::Relaxed);
        self.store.notify_write(relation, &self.unit);
        Ok(())
    }
}
