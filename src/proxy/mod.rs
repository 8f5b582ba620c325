//! Proxy request data model.
//!
//! # Data Flow
//! ```text
//! host application (Consumer)
//!     → ProxyRequest (raw, every field optional)
//!     → validation.rs (required fields, mode, http identifiers)
//!     → ConfigRecord (validated, fixed shape)
//!     → ConfigSet (ordered, serialized as a JSON array under `config`)
//!
//! Provider side:
//!     `config` payload
//!     → ProxyRequest list (serde_json)
//!     → validation.rs again (never trust the wire)
//!     → ConfigSet handed to the renderer
//! ```
//!
//! # Design Decisions
//! - A `ConfigRecord` can only be built by the validator
//! - Every mutation re-runs the full validation pass on a copy; failures leave the record untouched
//! - Normalization (dropping `httpchk`) is silent, rejection is explicit

pub mod record;
pub mod validation;

pub use record::{ConfigRecord, ConfigSet, ProxyMode, ProxyRequest};
pub use validation::{validate, ConfigSetError, ValidationError};
