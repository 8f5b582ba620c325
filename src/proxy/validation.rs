//! Proxy request validation.
//!
//! # Responsibilities
//! - Check the required fields (`external_port`, `internal_host`, `internal_port`)
//! - Resolve `mode` and `check` defaults
//! - Normalize `httpchk` away when it cannot apply
//! - Require an http identifier (`urlbase` or `subdomain`) in http mode
//!
//! # Design Decisions
//! - Rules run in a fixed order and stop at the first failure, so each
//!   error names exactly one cause
//! - Validation is a pure function: ProxyRequest → Result<ConfigRecord, ValidationError>
//! - Blank strings count as absent, like the falsy values of the original interface

use thiserror::Error;

use crate::proxy::record::{ConfigRecord, ProxyMode, ProxyRequest};

/// Reason a single proxy request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is absent, zero or empty.
    #[error("\"{0}\" is required")]
    MissingField(&'static str),

    /// `mode` is present but not a supported value.
    #[error("\"mode\" setting must be http, tcp or tcp+tls if provided (got \"{0}\")")]
    InvalidMode(String),

    /// http mode without `urlbase` or `subdomain`.
    #[error("\"urlbase\" or \"subdomain\" must be set in http mode")]
    MissingHttpIdentifier,
}

/// Reason a whole `config` payload was rejected.
#[derive(Debug, Error)]
pub enum ConfigSetError {
    #[error("config entry {index}: {source}")]
    InvalidEntry {
        index: usize,
        #[source]
        source: ValidationError,
    },

    #[error("config payload is not a list of proxy configs: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Validate a raw request into a [`ConfigRecord`].
pub fn validate(request: &ProxyRequest) -> Result<ConfigRecord, ValidationError> {
    let external_port = required_port(request.external_port, "external_port")?;
    let internal_host =
        present(&request.internal_host).ok_or(ValidationError::MissingField("internal_host"))?;
    let internal_port = required_port(request.internal_port, "internal_port")?;

    let mode = match present(&request.mode) {
        None => ProxyMode::Http,
        Some(raw) => raw.parse()?,
    };

    let check = request.check.unwrap_or(true);

    let httpchk = if mode == ProxyMode::Http && check {
        present(&request.httpchk)
    } else {
        None
    };

    let urlbase = present(&request.urlbase);
    let subdomain = present(&request.subdomain);
    if mode == ProxyMode::Http && urlbase.is_none() && subdomain.is_none() {
        return Err(ValidationError::MissingHttpIdentifier);
    }

    Ok(ConfigRecord {
        external_port,
        internal_host,
        internal_port,
        mode,
        check,
        httpchk,
        urlbase,
        subdomain,
    })
}

fn required_port(port: Option<u16>, field: &'static str) -> Result<u16, ValidationError> {
    match port {
        Some(port) if port > 0 => Ok(port),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}
