//! Provider → Consumer status exchange.
//!
//! # Data Flow
//! ```text
//! Provider:
//!     validation / render outcome
//!     → StatusRecord { outcome, message }
//!     → codec.rs (encode for the negotiated StatusEncoding)
//!     → Provider bag
//!
//! Consumer:
//!     Provider bag
//!     → codec.rs (decode)
//!     → ConfigAccepted / ProxyConfigError / MalformedStatus
//! ```
//!
//! # Encodings
//! - `line` (v1): `<consumer-unit>.status = "passed <message>"` or `"failed <message>"`
//! - `fields` (v2): `cfg_good = "true"|"false"`, `status_msg = <message>`
//!
//! An unset outcome is never written; it is the absence of the keys.
//!
//! The Provider ends every message with `[config <digest>]`, the digest of
//! the `config` payload it answers. The Consumer drops statuses whose digest
//! is not the one of its latest payload.

pub mod codec;

pub use codec::{config_digest, Outcome, StatusCodec, StatusEncoding, StatusError, StatusRecord};
