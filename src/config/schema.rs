//! Settings schema.
//!
//! All types derive Serde traits for deserialization from the settings file.

use serde::{Deserialize, Serialize};

use crate::proxy::ProxyRequest;
use crate::relation::RelationId;
use crate::status::StatusEncoding;

/// Root settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub driver: DriverSettings,
    pub observability: ObservabilityConfig,
    /// Only read by the simulator.
    pub scenario: Scenario,
}

/// Protocol driver settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DriverSettings {
    /// Relation endpoint name, e.g. "reverseproxy".
    pub relation_name: String,

    /// Numeric relation id; with `relation_name` this forms the `RelationId`.
    pub relation_id: u32,

    /// Status representation shared by both sides.
    pub status_encoding: StatusEncoding,

    /// Hostname the Provider advertises instead of asking the system.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl DriverSettings {
    pub fn relation(&self) -> RelationId {
        RelationId::new(&self.relation_name, self.relation_id)
    }
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            relation_name: "reverseproxy".to_string(),
            relation_id: 0,
            status_encoding: StatusEncoding::default(),
            hostname: None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

/// A two-unit exchange for the simulator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Scenario {
    pub consumer_unit: String,
    pub provider_unit: String,

    /// Ports string the Provider advertises.
    pub ports: String,

    /// Make the renderer refuse every config set.
    pub reject_render: bool,

    /// How long to wait for the Provider's status.
    pub timeout_secs: u64,

    pub requests: Vec<ProxyRequest>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            consumer_unit: "myapp/0".to_string(),
            provider_unit: "haproxy/0".to_string(),
            ports: "80".to_string(),
            reject_render: false,
            timeout_secs: 5,
            requests: Vec::new(),
        }
    }
}
