//! Settings subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → Settings (validated, immutable)
//!     → drivers, logging and the simulator scenario
//! ```
//!
//! # Design Decisions
//! - Every section has defaults so a minimal file is valid
//! - Validation separates syntactic (serde) from semantic checks
//! - Settings are read once at startup; there is no reload

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_settings, parse_settings, ConfigError};
pub use schema::{DriverSettings, ObservabilityConfig, Scenario, Settings};
