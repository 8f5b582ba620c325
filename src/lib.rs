//! Reverse-proxy relation protocol.
//!
//! A Consumer (an application unit) asks a Provider (a reverse proxy unit)
//! to publish its services. Both sides only exchange key/value data through
//! a directional relation store, driven by joined/changed/departed hooks.
//!
//! # Architecture Overview
//!
//! ```text
//!   Consumer unit                                           Provider unit
//!   ┌──────────────────────┐      relation store       ┌──────────────────────┐
//!   │ ConsumerDriver       │   own bag ──▶ peer reads  │ ProviderDriver       │
//!   │  configure(requests) ├── config ────────────────▶│  validate again      │
//!   │                      │                           │  Renderer            │
//!   │  ProxyReady          │◀──────── hostname, ports ─┤  advertise()         │
//!   │  ConfigAccepted /    │◀──────────────── status ──┤  passed / failed     │
//!   │  ProxyConfigError    │                           │                      │
//!   └──────────────────────┘                           └──────────────────────┘
//!
//!   Cross-cutting: proxy (records + validation), status (codec),
//!   relation (store, change tracking, state), config, observability, lifecycle
//! ```

// Protocol core
pub mod driver;
pub mod proxy;
pub mod relation;
pub mod status;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::Settings;
pub use driver::{ConsumerDriver, ProviderDriver, ProxyEvent, RelationEndpoint};
pub use lifecycle::{HookRunner, Shutdown};
pub use proxy::{ConfigRecord, ConfigSet, ProxyRequest};
pub use relation::{MemoryStore, RelationId, UnitId};
