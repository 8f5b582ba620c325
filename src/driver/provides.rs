//! Provider side of the relation: the unit operating the reverse proxy.
//!
//! # Responsibilities
//! - Advertise hostname and ports
//! - Decode and re-validate each Consumer's `config`
//! - Hand valid sets to the renderer and report the outcome as a status
//!
//! # Design Decisions
//! - A payload is processed once per distinct value
//! - Validation and render failures are written back as `failed`, never raised
//! - Every status is tagged with the digest of the payload it answers
//! - Departure drops the departing unit's set; once the last Consumer unit
//!   has gone the relation is departed and a rejoin is a fresh exchange

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info, warn};

use crate::driver::identity::{IdentitySource, SystemIdentity};
use crate::driver::render::Renderer;
use crate::driver::{
    relation_gone, DispatchTable, DriverError, RelationEndpoint, CONFIG_KEY, HOSTNAME_KEY,
    PORTS_KEY,
};
use crate::observability::metrics;
use crate::proxy::ConfigSet;
use crate::relation::{
    change_key, HookKind, PeerEndpoint, ProtocolState, RelationAdapter, RelationId,
    RelationStore, UnitId,
};
use crate::status::{config_digest, Outcome, StatusCodec, StatusEncoding, StatusRecord};

#[derive(Debug, Clone, Default)]
struct ProviderRelation {
    state: ProtocolState,
    peers: BTreeSet<UnitId>,
    configs: BTreeMap<UnitId, ConfigSet>,
    statuses: BTreeMap<UnitId, StatusRecord>,
}

/// Drives the Provider role for every relation of one proxy unit.
#[derive(Debug)]
pub struct ProviderDriver<S, R, I = SystemIdentity> {
    adapter: RelationAdapter<S>,
    renderer: R,
    identity: I,
    codec: StatusCodec,
    hostname: Option<String>,
    relations: HashMap<RelationId, ProviderRelation>,
    table: DispatchTable<Self>,
}

impl<S, R> ProviderDriver<S, R, SystemIdentity>
where
    S: RelationStore,
    R: Renderer,
{
    pub fn new(store: S, renderer: R, encoding: StatusEncoding) -> Self {
        Self::with_identity(store, renderer, SystemIdentity, encoding)
    }
}

impl<S, R, I> ProviderDriver<S, R, I>
where
    S: RelationStore,
    R: Renderer,
    I: IdentitySource,
{
    pub fn with_identity(store: S, renderer: R, identity: I, encoding: StatusEncoding) -> Self {
        let table = DispatchTable::new()
            .on(HookKind::Joined, Self::on_joined)
            .on(HookKind::Changed, Self::on_changed)
            .on(HookKind::Departed, Self::on_departed);
        Self {
            adapter: RelationAdapter::new(store),
            renderer,
            identity,
            codec: StatusCodec::new(encoding),
            hostname: None,
            relations: HashMap::new(),
            table,
        }
    }

    /// Hostname to advertise when `advertise` is not given one.
    pub fn with_hostname(mut self, hostname: Option<String>) -> Self {
        self.hostname = hostname.filter(|h| !h.is_empty());
        self
    }

    /// Write `hostname` and `ports` to the local bag.
    ///
    /// Without an explicit hostname, the configured one is used, then the
    /// identity source.
    pub fn advertise(
        &mut self,
        relation: &RelationId,
        ports: &str,
        hostname: Option<&str>,
    ) -> Result<(), DriverError> {
        if self.state(relation).is_departed() {
            return Err(relation_gone(relation));
        }

        let hostname = hostname
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .or_else(|| self.hostname.clone())
            .unwrap_or_else(|| self.identity.hostname());

        self.adapter.set(relation, HOSTNAME_KEY, &hostname)?;
        self.adapter.set(relation, PORTS_KEY, ports)?;
        self.relations
            .entry(relation.clone())
            .or_default()
            .state
            .mark_ready();
        info!(relation = %relation, hostname = %hostname, ports = %ports, "reverse proxy advertised");
        Ok(())
    }

    /// Write a status for `unit` on `relation`.
    pub fn set_status(
        &mut self,
        relation: &RelationId,
        unit: &UnitId,
        record: StatusRecord,
    ) -> Result<(), DriverError> {
        if self.state(relation).is_departed() {
            return Err(relation_gone(relation));
        }
        for (key, value) in self.codec.encode(unit, &record) {
            self.adapter.set(relation, &key, &value)?;
        }

        match record.outcome {
            Outcome::Passed => {
                info!(relation = %relation, unit = %unit, detail = record.message(), "reverse proxy config successful")
            }
            Outcome::Failed => {
                warn!(relation = %relation, unit = %unit, detail = record.message(), "reverse proxy config failed")
            }
            Outcome::Unset => {}
        }
        metrics::record_status_written(record.outcome);

        let entry = self.relations.entry(relation.clone()).or_default();
        match record.outcome {
            Outcome::Passed => {
                entry.state.mark_configured();
            }
            Outcome::Failed => entry.state.clear_configured(),
            Outcome::Unset => {}
        }
        entry.statuses.insert(unit.clone(), record);
        Ok(())
    }

    /// Last valid set received from `unit` on `relation`.
    pub fn config(&self, relation: &RelationId, unit: &UnitId) -> Option<&ConfigSet> {
        self.relations.get(relation)?.configs.get(unit)
    }

    /// Last status written for `unit` on `relation`.
    pub fn status(&self, relation: &RelationId, unit: &UnitId) -> Option<&StatusRecord> {
        self.relations.get(relation)?.statuses.get(unit)
    }

    pub fn state(&self, relation: &RelationId) -> ProtocolState {
        self.relations
            .get(relation)
            .map(|r| r.state)
            .unwrap_or_default()
    }

    pub fn local_unit(&self) -> &UnitId {
        self.adapter.local_unit()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    fn on_joined(&mut self, peer: &PeerEndpoint) -> Result<(), DriverError> {
        let entry = self.relations.entry(peer.relation.clone()).or_default();
        if entry.state.rejoin() {
            info!(relation = %peer.relation, "relation rejoined, starting a fresh exchange");
        }
        self.on_changed(peer)
    }

    fn on_changed(&mut self, peer: &PeerEndpoint) -> Result<(), DriverError> {
        let entry = self.relations.entry(peer.relation.clone()).or_default();
        if !entry.state.trigger() {
            debug!(relation = %peer.relation, "ignoring change on departed relation");
            return Ok(());
        }
        entry.peers.insert(peer.unit.clone());

        let Some(payload) = self.adapter.get(peer, CONFIG_KEY)? else {
            debug!(relation = %peer.relation, unit = %peer.unit, "no proxy config requested yet");
            return Ok(());
        };
        let key = change_key(&peer.relation, Some(&peer.unit), CONFIG_KEY);
        if !self.adapter.changed(&key, &payload) {
            debug!(relation = %peer.relation, unit = %peer.unit, "proxy config unchanged");
            return Ok(());
        }

        let result = self.apply(peer, &payload);
        if result.is_err() {
            // Let the next notification try again.
            self.adapter.forget(&key);
        }
        result
    }

    fn on_departed(&mut self, peer: &PeerEndpoint) -> Result<(), DriverError> {
        let entry = self.relations.entry(peer.relation.clone()).or_default();
        entry.peers.remove(&peer.unit);
        entry.configs.remove(&peer.unit);
        entry.statuses.remove(&peer.unit);
        if !entry.peers.is_empty() {
            self.adapter.forget_unit(&peer.relation, &peer.unit);
            info!(relation = %peer.relation, unit = %peer.unit, remaining = entry.peers.len(), "reverse proxy consumer unit departed");
            return Ok(());
        }

        let mut state = self.state(&peer.relation);
        state.depart();
        self.relations.insert(
            peer.relation.clone(),
            ProviderRelation {
                state,
                ..ProviderRelation::default()
            },
        );
        self.adapter.forget_relation(&peer.relation);
        info!(relation = %peer.relation, unit = %peer.unit, "reverse proxy consumer departed");
        Ok(())
    }

    fn apply(&mut self, peer: &PeerEndpoint, payload: &str) -> Result<(), DriverError> {
        let digest = config_digest(payload);
        let configs = match ConfigSet::from_json(payload) {
            Ok(configs) => configs,
            Err(err) => {
                metrics::record_validation_failure("provider");
                if let Some(entry) = self.relations.get_mut(&peer.relation) {
                    entry.configs.remove(&peer.unit);
                }
                let status = StatusRecord::failed(err.to_string()).answering(&digest);
                return self.set_status(&peer.relation, &peer.unit, status);
            }
        };

        info!(relation = %peer.relation, unit = %peer.unit, services = configs.len(), "rendering proxy config");
        let status = match self.renderer.render(peer, &configs) {
            Ok(()) => StatusRecord::passed(format!("{} service(s) configured", configs.len())),
            Err(err) => StatusRecord::failed(err.to_string()),
        };
        let status = status.answering(&digest);
        if status.outcome == Outcome::Passed {
            self.relations
                .entry(peer.relation.clone())
                .or_default()
                .configs
                .insert(peer.unit.clone(), configs);
        }
        self.set_status(&peer.relation, &peer.unit, status)
    }
}

impl<S, R, I> RelationEndpoint for ProviderDriver<S, R, I>
where
    S: RelationStore,
    R: Renderer,
    I: IdentitySource,
{
    const ROLE: &'static str = "provider";

    fn dispatch_table(&self) -> &DispatchTable<Self> {
        &self.table
    }
}
