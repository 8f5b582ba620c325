//! Proxy request and validated record types.
//!
//! `ProxyRequest` mirrors the permissive JSON object exchanged over the
//! relation. `ConfigRecord` is the only shape the rest of the crate sees.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::proxy::validation::{validate, ConfigSetError, ValidationError};

/// Proxying mode requested for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProxyMode {
    #[default]
    #[serde(rename = "http")]
    Http,
    #[serde(rename = "tcp")]
    Tcp,
    #[serde(rename = "tcp+tls")]
    TcpTls,
}

impl ProxyMode {
    /// Wire spelling of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyMode::Http => "http",
            ProxyMode::Tcp => "tcp",
            ProxyMode::TcpTls => "tcp+tls",
        }
    }
}

impl fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProxyMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(ProxyMode::Http),
            "tcp" => Ok(ProxyMode::Tcp),
            "tcp+tls" => Ok(ProxyMode::TcpTls),
            other => Err(ValidationError::InvalidMode(other.to_string())),
        }
    }
}

/// A raw proxy request, before validation.
///
/// Every field is optional and unknown keys are ignored, so anything a peer
/// writes decodes into this shape. Only [`validate`] turns it into a
/// [`ConfigRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_port: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_port: Option<u16>,

    /// One of `http`, `tcp`, `tcp+tls`. Kept as a string so an unsupported
    /// value reaches the validator instead of failing deserialization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub httpchk: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub urlbase: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
}

impl ProxyRequest {
    /// Start a request with the three required fields.
    pub fn new(external_port: u16, internal_host: impl Into<String>, internal_port: u16) -> Self {
        Self {
            external_port: Some(external_port),
            internal_host: Some(internal_host.into()),
            internal_port: Some(internal_port),
            ..Self::default()
        }
    }

    /// Request a mode by name. Unsupported names are rejected by [`validate`].
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Turn the backend health check on or off.
    pub fn with_check(mut self, check: bool) -> Self {
        self.check = Some(check);
        self
    }

    /// Health check request line, e.g. `GET /health`. Dropped on validation
    /// unless `check` is on and the mode is `http`.
    pub fn with_httpchk(mut self, httpchk: impl Into<String>) -> Self {
        self.httpchk = Some(httpchk.into());
        self
    }

    /// Route by path prefix.
    pub fn with_urlbase(mut self, urlbase: impl Into<String>) -> Self {
        self.urlbase = Some(urlbase.into());
        self
    }

    /// Route by host prefix, e.g. `app` for `app.<domain>`.
    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }
}

/// A validated proxying request.
///
/// Fields are private: construction goes through [`validate`] (or
/// `TryFrom<ProxyRequest>`), and every setter re-validates the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigRecord {
    pub(super) external_port: u16,
    pub(super) internal_host: String,
    pub(super) internal_port: u16,
    pub(super) mode: ProxyMode,
    pub(super) check: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) httpchk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) urlbase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) subdomain: Option<String>,
}

impl ConfigRecord {
    /// Port the proxy listens on.
    pub fn external_port(&self) -> u16 {
        self.external_port
    }

    /// Backend host traffic is forwarded to.
    pub fn internal_host(&self) -> &str {
        &self.internal_host
    }

    /// Backend port traffic is forwarded to.
    pub fn internal_port(&self) -> u16 {
        self.internal_port
    }

    /// Proxying mode; `http` when the request named none.
    pub fn mode(&self) -> ProxyMode {
        self.mode
    }

    /// Whether the backend is health checked. Defaults to true.
    pub fn check(&self) -> bool {
        self.check
    }

    /// Health check request line, if any.
    pub fn httpchk(&self) -> Option<&str> {
        self.httpchk.as_deref()
    }

    /// Path prefix routed to this backend, if any.
    pub fn urlbase(&self) -> Option<&str> {
        self.urlbase.as_deref()
    }

    /// Host prefix routed to this backend, if any.
    pub fn subdomain(&self) -> Option<&str> {
        self.subdomain.as_deref()
    }

    /// Convert back into the raw shape, e.g. to edit and re-validate.
    pub fn to_request(&self) -> ProxyRequest {
        ProxyRequest {
            external_port: Some(self.external_port),
            internal_host: Some(self.internal_host.clone()),
            internal_port: Some(self.internal_port),
            mode: Some(self.mode.as_str().to_string()),
            check: Some(self.check),
            httpchk: self.httpchk.clone(),
            urlbase: self.urlbase.clone(),
            subdomain: self.subdomain.clone(),
        }
    }

    /// Apply an edit to a raw copy and re-validate it.
    ///
    /// The record is replaced only if the edited copy validates; on error it
    /// is left exactly as it was.
    pub fn update<F>(&mut self, edit: F) -> Result<(), ValidationError>
    where
        F: FnOnce(&mut ProxyRequest),
    {
        let mut request = self.to_request();
        edit(&mut request);
        *self = validate(&request)?;
        Ok(())
    }

    /// Setters below go through [`ConfigRecord::update`], so a rejected
    /// value leaves the record unchanged.
    pub fn set_external_port(&mut self, port: u16) -> Result<(), ValidationError> {
        self.update(|r| r.external_port = Some(port))
    }

    pub fn set_internal(&mut self, host: impl Into<String>, port: u16) -> Result<(), ValidationError> {
        let host = host.into();
        self.update(|r| {
            r.internal_host = Some(host);
            r.internal_port = Some(port);
        })
    }

    pub fn set_mode(&mut self, mode: ProxyMode) -> Result<(), ValidationError> {
        self.update(|r| r.mode = Some(mode.as_str().to_string()))
    }

    pub fn set_check(&mut self, check: bool) -> Result<(), ValidationError> {
        self.update(|r| r.check = Some(check))
    }

    pub fn set_httpchk(&mut self, httpchk: Option<String>) -> Result<(), ValidationError> {
        self.update(|r| r.httpchk = httpchk)
    }

    pub fn set_urlbase(&mut self, urlbase: Option<String>) -> Result<(), ValidationError> {
        self.update(|r| r.urlbase = urlbase)
    }

    pub fn set_subdomain(&mut self, subdomain: Option<String>) -> Result<(), ValidationError> {
        self.update(|r| r.subdomain = subdomain)
    }
}

impl TryFrom<&ProxyRequest> for ConfigRecord {
    type Error = ValidationError;

    fn try_from(request: &ProxyRequest) -> Result<Self, Self::Error> {
        validate(request)
    }
}

impl TryFrom<ProxyRequest> for ConfigRecord {
    type Error = ValidationError;

    fn try_from(request: ProxyRequest) -> Result<Self, Self::Error> {
        validate(&request)
    }
}

/// Ordered list of validated records; order is the render order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConfigSet(Vec<ConfigRecord>);

impl ConfigSet {
    /// Validate every request. The first invalid entry aborts the whole set.
    pub fn from_requests<'a, I>(requests: I) -> Result<Self, ConfigSetError>
    where
        I: IntoIterator<Item = &'a ProxyRequest>,
    {
        requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| {
                validate(request).map_err(|source| ConfigSetError::InvalidEntry { index, source })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(ConfigSet)
    }

    /// Decode a `config` payload received from a peer and re-validate it.
    pub fn from_json(payload: &str) -> Result<Self, ConfigSetError> {
        let requests: Vec<ProxyRequest> = serde_json::from_str(payload)?;
        Self::from_requests(&requests)
    }

    /// Serialize for the `config` key.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    /// Records in render order.
    pub fn records(&self) -> &[ConfigRecord] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigRecord> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<ConfigRecord> for ConfigSet {
    fn from(record: ConfigRecord) -> Self {
        ConfigSet(vec![record])
    }
}

impl FromIterator<ConfigRecord> for ConfigSet {
    fn from_iter<T: IntoIterator<Item = ConfigRecord>>(iter: T) -> Self {
        ConfigSet(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ConfigSet {
    type Item = &'a ConfigRecord;
    type IntoIter = std::slice::Iter<'a, ConfigRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_record() -> ConfigRecord {
        validate(&ProxyRequest::new(80, "10.0.0.5", 8080).with_subdomain("app")).unwrap()
    }

    #[test]
    fn test_failed_update_leaves_record_untouched() {
        let mut record = app_record();
        let before = record.clone();

        // Dropping the only http identifier must be rejected as a whole.
        let err = record.set_subdomain(None).unwrap_err();
        assert_eq!(err, ValidationError::MissingHttpIdentifier);
        assert_eq!(record, before);

        let err = record.set_internal("", 9000).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("internal_host"));
        assert_eq!(record.internal_port(), 8080);
    }

    #[test]
    fn test_switching_to_tcp_drops_httpchk() {
        let mut record = validate(
            &ProxyRequest::new(80, "10.0.0.5", 8080)
                .with_urlbase("/app")
                .with_httpchk("GET /health"),
        )
        .unwrap();
        assert_eq!(record.httpchk(), Some("GET /health"));

        record.set_mode(ProxyMode::Tcp).unwrap();
        assert_eq!(record.mode(), ProxyMode::Tcp);
        assert_eq!(record.httpchk(), None);

        // Switching back does not resurrect it.
        record.set_mode(ProxyMode::Http).unwrap();
        assert_eq!(record.httpchk(), None);
    }

    #[test]
    fn test_config_set_survives_the_wire() {
        let set = ConfigSet::from_requests(&[
            ProxyRequest::new(80, "10.0.0.5", 8080).with_subdomain("app"),
            ProxyRequest::new(5432, "10.0.0.6", 5432).with_mode("tcp"),
            ProxyRequest::new(443, "10.0.0.7", 8443)
                .with_mode("tcp+tls")
                .with_check(false),
        ])
        .unwrap();

        let payload = set.to_json().unwrap();
        let decoded = ConfigSet::from_json(&payload).unwrap();
        assert_eq!(decoded, set);
        for record in &decoded {
            assert_eq!(validate(&record.to_request()).unwrap(), *record);
        }
    }

    #[test]
    fn test_serialized_shape() {
        let payload = ConfigSet::from(app_record()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{
                "external_port": 80,
                "internal_host": "10.0.0.5",
                "internal_port": 8080,
                "mode": "http",
                "check": true,
                "subdomain": "app"
            }])
        );
    }

    #[test]
    fn test_from_json_names_failing_entry() {
        let payload = r#"[
            {"external_port": 80, "internal_host": "a", "internal_port": 1, "urlbase": "/a"},
            {"external_port": 81, "internal_host": "b", "internal_port": 2, "mode": "udp"}
        ]"#;
        match ConfigSet::from_json(payload) {
            Err(ConfigSetError::InvalidEntry { index, source }) => {
                assert_eq!(index, 1);
                assert_eq!(source, ValidationError::InvalidMode("udp".into()));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_from_json_rejects_non_list() {
        let err = ConfigSet::from_json(r#"{"external_port": 80}"#).unwrap_err();
        assert!(matches!(err, ConfigSetError::Payload(_)));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("tcp+tls".parse::<ProxyMode>().unwrap(), ProxyMode::TcpTls);
        assert_eq!(ProxyMode::TcpTls.to_string(), "tcp+tls");
        assert!("HTTP".parse::<ProxyMode>().is_err());
    }
}
