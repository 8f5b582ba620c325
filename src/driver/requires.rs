//! Consumer side of the relation: the application asking to be proxied.
//!
//! # Responsibilities
//! - Publish a validated config set under `config`
//! - Notice when the Provider advertises hostname and ports
//! - Decode the Provider's status and raise it to the host
//!
//! # Design Decisions
//! - Only a status answering the latest published payload is raised
//! - Departure is per Provider unit; the relation is departed once the last
//!   one has gone

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, error, info, warn};

use crate::driver::events::{NotificationSink, ProxyEvent};
use crate::driver::{
    relation_gone, DispatchTable, DriverError, RelationEndpoint, CONFIG_KEY, HOSTNAME_KEY,
    PORTS_KEY,
};
use crate::observability::metrics;
use crate::proxy::{ConfigSet, ProxyRequest};
use crate::relation::{
    change_key, HookKind, PeerEndpoint, ProtocolState, RelationAdapter, RelationId,
    RelationStore, UnitId,
};
use crate::status::{config_digest, Outcome, StatusCodec, StatusEncoding, StatusRecord};

/// Tracker key suffixes for observations of Provider data.
const ENDPOINT_OBSERVATION: &str = "endpoint";
const STATUS_OBSERVATION: &str = "status";

#[derive(Debug, Clone, Default)]
struct ConsumerRelation {
    state: ProtocolState,
    peers: BTreeSet<UnitId>,
    hostname: Option<String>,
    ports: Option<String>,
    advertised_by: Option<UnitId>,
    status: Option<StatusRecord>,
    config: Option<ConfigSet>,
    digest: Option<String>,
}

/// Drives the Consumer role for every relation of one unit.
#[derive(Debug)]
pub struct ConsumerDriver<S, N> {
    adapter: RelationAdapter<S>,
    sink: N,
    codec: StatusCodec,
    relations: HashMap<RelationId, ConsumerRelation>,
    table: DispatchTable<Self>,
}

impl<S, N> ConsumerDriver<S, N>
where
    S: RelationStore,
    N: NotificationSink,
{
    pub fn new(store: S, sink: N, encoding: StatusEncoding) -> Self {
        Self::with_adapter(RelationAdapter::new(store), sink, encoding)
    }

    /// Build around an adapter, e.g. one restored with a persisted tracker.
    pub fn with_adapter(adapter: RelationAdapter<S>, sink: N, encoding: StatusEncoding) -> Self {
        let table = DispatchTable::new()
            .on(HookKind::Joined, Self::on_joined)
            .on(HookKind::Changed, Self::on_changed)
            .on(HookKind::Departed, Self::on_departed);
        Self {
            adapter,
            sink,
            codec: StatusCodec::new(encoding),
            relations: HashMap::new(),
            table,
        }
    }

    /// Validate `requests` and publish them on `relation`.
    ///
    /// Nothing is written unless every request validates. Publishing the
    /// same set twice writes once.
    pub fn configure(
        &mut self,
        relation: &RelationId,
        requests: &[ProxyRequest],
    ) -> Result<(), DriverError> {
        let configs = ConfigSet::from_requests(requests).map_err(|err| {
            metrics::record_validation_failure("consumer");
            warn!(relation = %relation, error = %err, "proxy config rejected before publishing");
            err
        })?;
        self.publish(relation, configs)
    }

    /// Publish an already validated set on `relation`.
    pub fn publish(&mut self, relation: &RelationId, configs: ConfigSet) -> Result<(), DriverError> {
        if self.state(relation).is_departed() {
            return Err(relation_gone(relation));
        }

        let payload = configs.to_json()?;
        let key = change_key(relation, None, CONFIG_KEY);
        if self.adapter.differs(&key, &payload) {
            self.adapter.set(relation, CONFIG_KEY, &payload)?;
            self.adapter.changed(&key, &payload);
            // The next verdict may repeat an earlier one byte for byte.
            self.adapter.forget_peer_key(relation, STATUS_OBSERVATION);
            metrics::record_config_write();
            info!(relation = %relation, services = configs.len(), "proxy config published");
        } else {
            debug!(relation = %relation, "proxy config unchanged, skipping write");
        }

        let entry = self.relations.entry(relation.clone()).or_default();
        entry.digest = Some(config_digest(&payload));
        entry.config = Some(configs);
        entry.state.mark_configured();
        Ok(())
    }

    /// Hostname advertised by the Provider.
    pub fn proxy_hostname(&self, relation: &RelationId) -> Option<&str> {
        self.relations.get(relation)?.hostname.as_deref()
    }

    /// Ports advertised by the Provider.
    pub fn proxy_ports(&self, relation: &RelationId) -> Option<&str> {
        self.relations.get(relation)?.ports.as_deref()
    }

    /// Last status decoded from the Provider.
    pub fn status(&self, relation: &RelationId) -> Option<&StatusRecord> {
        self.relations.get(relation)?.status.as_ref()
    }

    /// Last set published on `relation`.
    pub fn config(&self, relation: &RelationId) -> Option<&ConfigSet> {
        self.relations.get(relation)?.config.as_ref()
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

    pub fn adapter(&self) -> &RelationAdapter<S> {
        &self.adapter
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut N {
        &mut self.sink
    }

    fn on_joined(&mut self, peer: &PeerEndpoint) -> Result<(), DriverError> {
        let entry = self.relations.entry(peer.relation.clone()).or_default();
        if entry.state.rejoin() {
            info!(relation = %peer.relation, "relation rejoined, starting a fresh exchange");
        }
        entry.state.trigger();
        entry.peers.insert(peer.unit.clone());
        info!(relation = %peer.relation, unit = %peer.unit, "reverse proxy peer connected");
        self.sink.notify(ProxyEvent::PeerConnected {
            relation: peer.relation.clone(),
            unit: peer.unit.clone(),
        });
        Ok(())
    }

    fn on_changed(&mut self, peer: &PeerEndpoint) -> Result<(), DriverError> {
        let entry = self.relations.entry(peer.relation.clone()).or_default();
        if !entry.state.trigger() {
            debug!(relation = %peer.relation, "ignoring change on departed relation");
            return Ok(());
        }
        entry.peers.insert(peer.unit.clone());
        self.observe_endpoint(peer)?;
        self.observe_status(peer)
    }

    fn on_departed(&mut self, peer: &PeerEndpoint) -> Result<(), DriverError> {
        let entry = self.relations.entry(peer.relation.clone()).or_default();
        entry.peers.remove(&peer.unit);
        if !entry.peers.is_empty() {
            if entry.advertised_by.as_ref() == Some(&peer.unit) {
                entry.hostname = None;
                entry.ports = None;
                entry.advertised_by = None;
                entry.state.ready = false;
            }
            self.adapter.forget_unit(&peer.relation, &peer.unit);
            info!(relation = %peer.relation, unit = %peer.unit, remaining = entry.peers.len(), "reverse proxy unit departed");
            return Ok(());
        }

        let mut state = self.state(&peer.relation);
        state.depart();
        self.relations.insert(
            peer.relation.clone(),
            ConsumerRelation {
                state,
                ..ConsumerRelation::default()
            },
        );
        self.adapter.forget_relation(&peer.relation);
        info!(relation = %peer.relation, unit = %peer.unit, "reverse proxy departed");
        Ok(())
    }

    fn observe_endpoint(&mut self, peer: &PeerEndpoint) -> Result<(), DriverError> {
        let hostname = self.adapter.get(peer, HOSTNAME_KEY)?.filter(|h| !h.is_empty());
        let ports = self.adapter.get(peer, PORTS_KEY)?.filter(|p| !p.is_empty());
        let (Some(hostname), Some(ports)) = (hostname, ports) else {
            debug!(relation = %peer.relation, "proxy endpoint not advertised yet");
            return Ok(());
        };

        let key = change_key(&peer.relation, Some(&peer.unit), ENDPOINT_OBSERVATION);
        if !self.adapter.changed(&key, &format!("{}\n{}", hostname, ports)) {
            return Ok(());
        }

        let entry = self.relations.entry(peer.relation.clone()).or_default();
        entry.state.mark_ready();
        entry.hostname = Some(hostname.clone());
        entry.ports = Some(ports.clone());
        entry.advertised_by = Some(peer.unit.clone());
        info!(relation = %peer.relation, hostname = %hostname, ports = %ports, "reverse proxy is ready");
        self.sink.notify(ProxyEvent::ProxyReady {
            relation: peer.relation.clone(),
            hostname,
            ports,
        });
        Ok(())
    }

    fn observe_status(&mut self, peer: &PeerEndpoint) -> Result<(), DriverError> {
        let local = self.adapter.local_unit().clone();
        let mut values = BTreeMap::new();
        for key in self.codec.keys(&local) {
            if let Some(value) = self.adapter.get(peer, &key)? {
                values.insert(key, value);
            }
        }
        if values.is_empty() {
            debug!(relation = %peer.relation, "proxy config status not yet set");
            return Ok(());
        }

        let fingerprint = values
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("\n");
        let key = change_key(&peer.relation, Some(&peer.unit), STATUS_OBSERVATION);
        if !self.adapter.changed(&key, &fingerprint) {
            return Ok(());
        }

        let relation = peer.relation.clone();
        let mut record = match self.codec.decode(&local, &values) {
            Ok(record) => record,
            Err(err) => {
                warn!(relation = %relation, error = %err, "could not decode proxy status");
                self.sink.notify(ProxyEvent::MalformedStatus {
                    relation,
                    message: err.to_string(),
                });
                return Ok(());
            }
        };

        let answers = record.take_digest();
        let pending = self
            .relations
            .get(&relation)
            .and_then(|entry| entry.digest.as_deref());
        if let (Some(answers), Some(pending)) = (answers.as_deref(), pending) {
            if answers != pending {
                debug!(relation = %relation, answers = %answers, pending = %pending, "status answers an earlier config");
                return Ok(());
            }
        }

        metrics::record_status_observed(record.outcome);
        let event = match record.outcome {
            Outcome::Unset => None,
            Outcome::Passed => {
                info!(relation = %relation, status = %record, "reverse proxy accepted config");
                Some(ProxyEvent::ConfigAccepted {
                    relation: relation.clone(),
                    message: record.message.clone(),
                })
            }
            Outcome::Failed => {
                error!(relation = %relation, status = %record, "reverse proxy rejected config");
                Some(ProxyEvent::ProxyConfigError {
                    relation: relation.clone(),
                    message: record.message().to_string(),
                })
            }
        };
        self.relations.entry(relation).or_default().status = Some(record);
        if let Some(event) = event {
            self.sink.notify(event);
        }
        Ok(())
    }
}

impl<S, N> RelationEndpoint for ConsumerDriver<S, N>
where
    S: RelationStore,
    N: NotificationSink,
{
    const ROLE: &'static str = "consumer";

    fn dispatch_table(&self) -> &DispatchTable<Self> {
        &self.table
    }
}
