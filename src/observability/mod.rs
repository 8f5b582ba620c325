//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Drivers and host loop produce:
//!     → logging.rs (structured tracing events: relation, unit, outcome)
//!     → metrics.rs (counters through the `metrics` facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → whatever metrics recorder the host installs
//! ```
//!
//! # Design Decisions
//! - Structured logging (key/value fields) for machine parsing
//! - `RUST_LOG` overrides the configured level
//! - No exporter is installed here; without a recorder, metrics are no-ops

pub mod logging;
pub mod metrics;
