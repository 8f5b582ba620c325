//! Status record encoding and decoding.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::relation::store::UnitId;

pub const CFG_GOOD_KEY: &str = "cfg_good";
pub const STATUS_MSG_KEY: &str = "status_msg";

const DIGEST_TAG: &str = "[config ";
const DIGEST_BYTES: usize = 6;

/// Short digest of a `config` payload, used to tie a status to the
/// payload it answers.
pub fn config_digest(payload: &str) -> String {
    hex::encode(&Sha256::digest(payload.as_bytes())[..DIGEST_BYTES])
}

/// Result of the Provider applying a config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[default]
    Unset,
    Passed,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Unset => "unset",
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusRecord {
    pub outcome: Outcome,
    pub message: Option<String>,
}

impl StatusRecord {
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn passed(message: impl Into<String>) -> Self {
        Self::with(Outcome::Passed, message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::with(Outcome::Failed, message.into())
    }

    fn with(outcome: Outcome, message: String) -> Self {
        Self {
            outcome,
            message: if message.is_empty() { None } else { Some(message) },
        }
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    /// Tag the message with the digest of the config payload this status
    /// answers.
    pub fn answering(mut self, digest: &str) -> Self {
        let tag = format!("{}{}]", DIGEST_TAG, digest);
        self.message = Some(match self.message.take() {
            Some(message) => format!("{} {}", message, tag),
            None => tag,
        });
        self
    }

    /// Remove the digest tag from the message and return the digest.
    ///
    /// `None` for a status written without one.
    pub fn take_digest(&mut self) -> Option<String> {
        let message = self.message.as_deref()?;
        let start = message.rfind(DIGEST_TAG)?;
        let digest = message[start + DIGEST_TAG.len()..].strip_suffix(']')?.to_string();
        let rest = message[..start].trim_end().to_string();
        self.message = if rest.is_empty() { None } else { Some(rest) };
        Some(digest)
    }
}

impl fmt::Display for StatusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} {}", self.outcome, message),
            None => write!(f, "{}", self.outcome),
        }
    }
}

/// Which status representation a protocol version uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusEncoding {
    /// `<unit>.status` single value.
    #[default]
    Line,
    /// `cfg_good` + `status_msg` pair.
    Fields,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("malformed status {key}={value:?}")]
    Malformed { key: String, value: String },
}

/// Encoder/decoder for one [`StatusEncoding`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCodec {
    encoding: StatusEncoding,
}

impl StatusCodec {
    pub fn new(encoding: StatusEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> StatusEncoding {
        self.encoding
    }

    /// Keys the status for `unit` is stored under.
    pub fn keys(&self, unit: &UnitId) -> Vec<String> {
        match self.encoding {
            StatusEncoding::Line => vec![line_key(unit)],
            StatusEncoding::Fields => vec![CFG_GOOD_KEY.to_string(), STATUS_MSG_KEY.to_string()],
        }
    }

    /// Key/value pairs to write. Empty for an unset record.
    pub fn encode(&self, unit: &UnitId, record: &StatusRecord) -> Vec<(String, String)> {
        let good = match record.outcome {
            Outcome::Unset => return Vec::new(),
            Outcome::Passed => true,
            Outcome::Failed => false,
        };
        match self.encoding {
            StatusEncoding::Line => vec![(line_key(unit), record.to_string())],
            StatusEncoding::Fields => vec![
                (CFG_GOOD_KEY.to_string(), good.to_string()),
                (STATUS_MSG_KEY.to_string(), record.message().to_string()),
            ],
        }
    }

    /// Decode from the values present in the Provider bag.
    ///
    /// `values` holds only keys that exist; missing keys decode as unset.
    pub fn decode(
        &self,
        unit: &UnitId,
        values: &BTreeMap<String, String>,
    ) -> Result<StatusRecord, StatusError> {
        match self.encoding {
            StatusEncoding::Line => {
                let key = line_key(unit);
                match values.get(&key) {
                    Some(value) => decode_line(&key, value),
                    None => Ok(StatusRecord::unset()),
                }
            }
            StatusEncoding::Fields => {
                let Some(good) = values.get(CFG_GOOD_KEY) else {
                    return Ok(StatusRecord::unset());
                };
                let message = values.get(STATUS_MSG_KEY).cloned().unwrap_or_default();
                if good.eq_ignore_ascii_case("true") {
                    Ok(StatusRecord::passed(message))
                } else if good.eq_ignore_ascii_case("false") {
                    Ok(StatusRecord::failed(message))
                } else {
                    Err(StatusError::Malformed {
                        key: CFG_GOOD_KEY.to_string(),
                        value: good.clone(),
                    })
                }
            }
        }
    }
}

fn line_key(unit: &UnitId) -> String {
    format!("{}.status", unit)
}

fn decode_line(key: &str, value: &str) -> Result<StatusRecord, StatusError> {
    let (outcome, rest) = if let Some(rest) = value.strip_prefix("passed") {
        (Outcome::Passed, rest)
    } else if let Some(rest) = value.strip_prefix("failed") {
        (Outcome::Failed, rest)
    } else {
        return Err(StatusError::Malformed {
            key: key.to_string(),
            value: value.to_string(),
        });
    };
    Ok(StatusRecord::with(outcome, rest.trim().to_string()))
}
