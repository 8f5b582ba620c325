//! Proxy configuration renderer seam.
//!
//! The renderer is the host's proxy-server writer (e.g. haproxy). The
//! Provider driver calls it only with a validated [`ConfigSet`].

use thiserror::Error;
use tracing::info;

use crate::proxy::{ConfigRecord, ConfigSet, ProxyMode};
use crate::relation::PeerEndpoint;

/// Opaque failure reported by a renderer; its message becomes the
/// `failed` status text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RenderError {
    message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub trait Renderer {
    /// Apply `configs` requested by `peer`.
    fn render(&mut self, peer: &PeerEndpoint, configs: &ConfigSet) -> Result<(), RenderError>;
}

impl<F> Renderer for F
where
    F: FnMut(&PeerEndpoint, &ConfigSet) -> Result<(), RenderError>,
{
    fn render(&mut self, peer: &PeerEndpoint, configs: &ConfigSet) -> Result<(), RenderError> {
        self(peer, configs)
    }
}

/// Renders each record as an haproxy-style stanza and logs it.
///
/// Used by the simulator in place of a real proxy writer.
#[derive(Debug, Clone, Default)]
pub struct StanzaRenderer {
    reject: Option<String>,
    rendered: Vec<String>,
}

impl StanzaRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every render with `message`.
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            reject: Some(message.into()),
            rendered: Vec::new(),
        }
    }

    /// Stanzas produced so far.
    pub fn rendered(&self) -> &[String] {
        &self.rendered
    }
}

impl Renderer for StanzaRenderer {
    fn render(&mut self, peer: &PeerEndpoint, configs: &ConfigSet) -> Result<(), RenderError> {
        if let Some(message) = &self.reject {
            return Err(RenderError::new(message.clone()));
        }
        for record in configs {
            let text = stanza(peer, record);
            info!(relation = %peer.relation, unit = %peer.unit, "rendered stanza\n{}", text);
            self.rendered.push(text);
        }
        Ok(())
    }
}

/// haproxy-style frontend/backend pair for one record.
pub fn stanza(peer: &PeerEndpoint, record: &ConfigRecord) -> String {
    let name = format!("{}-{}", peer.unit.app(), record.external_port());
    let mode = match record.mode() {
        ProxyMode::Http => "http",
        ProxyMode::Tcp | ProxyMode::TcpTls => "tcp",
    };

    let mut lines = vec![
        format!("frontend {}", name),
        format!("    bind *:{}", record.external_port()),
        format!("    mode {}", mode),
    ];
    if let Some(subdomain) = record.subdomain() {
        lines.push(format!("    acl host_match hdr_beg(host) -i {}.", subdomain));
    }
    if let Some(urlbase) = record.urlbase() {
        lines.push(format!("    acl path_match path_beg {}", urlbase));
    }
    lines.push(format!("    default_backend {}", name));
    lines.push(format!("backend {}", name));
    lines.push(format!("    mode {}", mode));
    if let Some(httpchk) = record.httpchk() {
        lines.push(format!("    option httpchk {}", httpchk));
    }
    lines.push(format!(
        "    server {} {}:{}{}",
        peer.unit.as_str().replace('/', "-"),
        record.internal_host(),
        record.internal_port(),
        if record.check() { " check" } else { "" }
    ));
    lines.join("\n")
}
