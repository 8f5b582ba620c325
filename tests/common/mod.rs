//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use reverseproxy_relation::driver::{
    DriverError, RecordingSink, RenderError, Renderer, StaticIdentity,
};
use reverseproxy_relation::relation::{Hook, UnitView};
use reverseproxy_relation::status::StatusEncoding;
use reverseproxy_relation::{
    ConfigSet, ConsumerDriver, MemoryStore, ProviderDriver, ProxyEvent, ProxyRequest,
    RelationEndpoint, RelationId, UnitId,
};

pub const CONSUMER: &str = "myapp/0";
pub const PROVIDER: &str = "haproxy/0";
pub const PROXY_HOST: &str = "proxy.internal";

/// Renderer that records what it was given and fails on demand.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRenderer {
    seen: Arc<Mutex<Vec<ConfigSet>>>,
    fail_with: Arc<Mutex<Option<String>>>,
}

impl ScriptedRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }

    pub fn succeed(&self) {
        *self.fail_with.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<ConfigSet> {
        self.seen.lock().unwrap().last().cloned()
    }
}

impl Renderer for ScriptedRenderer {
    fn render(
        &mut self,
        _peer: &reverseproxy_relation::relation::PeerEndpoint,
        configs: &ConfigSet,
    ) -> Result<(), RenderError> {
        self.seen.lock().unwrap().push(configs.clone());
        match self.fail_with.lock().unwrap().as_ref() {
            Some(message) => Err(RenderError::new(message.clone())),
            None => Ok(()),
        }
    }
}

pub type Consumer = ConsumerDriver<UnitView, RecordingSink>;
pub type Provider = ProviderDriver<UnitView, ScriptedRenderer, StaticIdentity>;

/// One Consumer and one Provider unit sharing a `MemoryStore`.
///
/// Hooks queue up in the watch channels until `pump` delivers them.
pub struct Pair {
    pub store: MemoryStore,
    pub relation: RelationId,
    pub consumer: Consumer,
    pub provider: Provider,
    pub renderer: ScriptedRenderer,
    consumer_hooks: mpsc::UnboundedReceiver<Hook>,
    provider_hooks: mpsc::UnboundedReceiver<Hook>,
}

impl Pair {
    pub fn new(encoding: StatusEncoding) -> Self {
        let store = MemoryStore::new();
        let relation = RelationId::new("reverseproxy", 0);
        let renderer = ScriptedRenderer::new();
        Self {
            consumer_hooks: store.watch(CONSUMER),
            provider_hooks: store.watch(PROVIDER),
            consumer: ConsumerDriver::new(store.view(CONSUMER), RecordingSink::new(), encoding),
            provider: ProviderDriver::with_identity(
                store.view(PROVIDER),
                renderer.clone(),
                StaticIdentity(PROXY_HOST.to_string()),
                encoding,
            ),
            renderer,
            store,
            relation,
        }
    }

    /// Both units join and the Provider advertises.
    pub fn connected(encoding: StatusEncoding) -> Self {
        let mut pair = Self::new(encoding);
        pair.join();
        pair.provider
            .advertise(&pair.relation, "80,443", None)
            .unwrap();
        assert!(pair.pump().is_empty());
        pair
    }

    pub fn join(&mut self) {
        self.store.join(&self.relation, &UnitId::from(PROVIDER));
        self.store.join(&self.relation, &UnitId::from(CONSUMER));
        assert!(self.pump().is_empty());
    }

    /// The Consumer leaves, then the Provider, and the relation goes away.
    pub fn break_relation(&mut self) {
        self.store.leave(&self.relation, &UnitId::from(CONSUMER));
        self.store.leave(&self.relation, &UnitId::from(PROVIDER));
        self.store.teardown(&self.relation);
        assert!(self.pump().is_empty());
    }

    /// Deliver queued hooks until both queues are empty. Returns handler
    /// errors in delivery order.
    pub fn pump(&mut self) -> Vec<DriverError> {
        let mut errors = Vec::new();
        loop {
            let handled = self.pump_provider_into(&mut errors) + self.pump_consumer_into(&mut errors);
            if handled == 0 {
                return errors;
            }
        }
    }

    /// Deliver only the hooks queued for the Provider right now.
    pub fn pump_provider(&mut self) -> Vec<DriverError> {
        let mut errors = Vec::new();
        self.pump_provider_into(&mut errors);
        errors
    }

    /// Deliver only the hooks queued for the Consumer right now.
    pub fn pump_consumer(&mut self) -> Vec<DriverError> {
        let mut errors = Vec::new();
        self.pump_consumer_into(&mut errors);
        errors
    }

    fn pump_provider_into(&mut self, errors: &mut Vec<DriverError>) -> usize {
        let hooks: Vec<Hook> = std::iter::from_fn(|| self.provider_hooks.try_recv().ok()).collect();
        for hook in &hooks {
            errors.extend(self.provider.handle(hook).err());
        }
        hooks.len()
    }

    fn pump_consumer_into(&mut self, errors: &mut Vec<DriverError>) -> usize {
        let hooks: Vec<Hook> = std::iter::from_fn(|| self.consumer_hooks.try_recv().ok()).collect();
        for hook in &hooks {
            errors.extend(self.consumer.handle(hook).err());
        }
        hooks.len()
    }

    /// Hooks currently queued for the Provider, without handling them.
    pub fn queued_for_provider(&mut self) -> Vec<Hook> {
        std::iter::from_fn(|| self.provider_hooks.try_recv().ok()).collect()
    }

    pub fn events(&mut self) -> Vec<ProxyEvent> {
        self.consumer.sink_mut().drain()
    }

    /// Write a raw `config` payload as the Consumer, skipping its validation.
    pub fn write_raw_config(&self, payload: &str) {
        use reverseproxy_relation::relation::RelationStore;
        self.store
            .view(CONSUMER)
            .set(&self.relation, "config", payload)
            .unwrap();
    }
}

pub fn app_request() -> ProxyRequest {
    ProxyRequest::new(80, "10.0.0.5", 8080).with_subdomain("app")
}
