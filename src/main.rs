//! relation-sim: runs one reverse-proxy relation exchange in-process.
//!
//! # Architecture Overview
//!
//! ```text
//!   settings.toml ──▶ Settings
//!                        │
//!        ┌───────────────┴────────────────┐
//!        ▼                                ▼
//!   ConsumerDriver                   ProviderDriver ──▶ StanzaRenderer (logs)
//!        ▲   │                            ▲   │
//!        │   └──── MemoryStore bags ──────┼───┘
//!        │                                │
//!   HookRunner ◀── hooks ── MemoryStore ──▶ HookRunner
//!        │
//!        └──▶ ChannelSink ──▶ main waits for ConfigAccepted / ProxyConfigError
//! ```
//!
//! Exits non-zero when the Consumer rejects its own requests, when the
//! Provider reports a failed status, or when no status arrives in time.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tokio::sync::mpsc;

use reverseproxy_relation::config::{load_settings, Settings};
use reverseproxy_relation::driver::{ChannelSink, StanzaRenderer};
use reverseproxy_relation::observability::logging::init_logging;
use reverseproxy_relation::{
    ConsumerDriver, HookRunner, MemoryStore, ProviderDriver, ProxyEvent, Shutdown, UnitId,
};

#[derive(Debug, Parser)]
#[command(name = "relation-sim", version, about = "Simulate a reverse-proxy relation exchange")]
struct Cli {
    /// Path to the TOML settings file. Defaults apply when omitted.
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Emit JSON logs regardless of the settings file.
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Error)]
enum SimError {
    #[error("reverse proxy rejected the config: {0}")]
    Rejected(String),

    #[error("malformed status from the reverse proxy: {0}")]
    Malformed(String),

    #[error("no status from the reverse proxy within {0}s")]
    TimedOut(u64),

    #[error("event channel closed before the reverse proxy answered")]
    Closed,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut settings = match &cli.settings {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };
    if cli.json_logs {
        settings.observability.json = true;
    }
    init_logging(&settings.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "relation-sim starting");

    let relation = settings.driver.relation();
    let encoding = settings.driver.status_encoding;
    let scenario = &settings.scenario;
    let consumer_unit = UnitId::from(scenario.consumer_unit.as_str());
    let provider_unit = UnitId::from(scenario.provider_unit.as_str());

    tracing::info!(
        relation = %relation,
        consumer = %consumer_unit,
        provider = %provider_unit,
        encoding = ?encoding,
        requests = scenario.requests.len(),
        "Scenario loaded"
    );

    let store = MemoryStore::new();
    let consumer_hooks = store.watch(consumer_unit.clone());
    let provider_hooks = store.watch(provider_unit.clone());

    let (sink, mut events) = ChannelSink::channel();
    let mut consumer = ConsumerDriver::new(store.view(consumer_unit.clone()), sink, encoding);
    let renderer = if scenario.reject_render {
        StanzaRenderer::rejecting("render rejected by scenario")
    } else {
        StanzaRenderer::new()
    };
    let mut provider = ProviderDriver::new(store.view(provider_unit.clone()), renderer, encoding)
        .with_hostname(settings.driver.hostname.clone());

    store.join(&relation, &provider_unit);
    store.join(&relation, &consumer_unit);

    provider.advertise(&relation, &scenario.ports, None)?;
    if let Err(err) = consumer.configure(&relation, &scenario.requests) {
        tracing::error!(error = %err, "Consumer rejected its own proxy requests");
        return Err(err.into());
    }

    let shutdown = Shutdown::new();
    let consumer_task = tokio::spawn(HookRunner::new(consumer, consumer_hooks).run(shutdown.subscribe()));
    let provider_task = tokio::spawn(HookRunner::new(provider, provider_hooks).run(shutdown.subscribe()));

    let verdict = tokio::time::timeout(
        Duration::from_secs(scenario.timeout_secs),
        await_status(&mut events),
    )
    .await
    .unwrap_or(Err(SimError::TimedOut(scenario.timeout_secs)));

    shutdown.trigger();
    let consumer = consumer_task.await?;
    let provider = provider_task.await?;

    tracing::info!(
        consumer_state = ?consumer.state(&relation),
        provider_state = ?provider.state(&relation),
        proxy_hostname = consumer.proxy_hostname(&relation).unwrap_or("-"),
        proxy_ports = consumer.proxy_ports(&relation).unwrap_or("-"),
        stanzas = provider.renderer().rendered().len(),
        writes = store.write_count(),
        "Exchange finished"
    );

    verdict?;
    tracing::info!("relation-sim complete");
    Ok(())
}

/// Log events until the Provider's verdict arrives.
async fn await_status(events: &mut mpsc::UnboundedReceiver<ProxyEvent>) -> Result<(), SimError> {
    while let Some(event) = events.recv().await {
        tracing::info!(event = ?event, "Proxy event");
        match event {
            ProxyEvent::ConfigAccepted { .. } => return Ok(()),
            ProxyEvent::ProxyConfigError { message, .. } => return Err(SimError::Rejected(message)),
            ProxyEvent::MalformedStatus { message, .. } => return Err(SimError::Malformed(message)),
            ProxyEvent::PeerConnected { .. } | ProxyEvent::ProxyReady { .. } => {}
        }
    }
    Err(SimError::Closed)
}
