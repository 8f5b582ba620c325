//! Local host identity for the Provider's advertised hostname.

use std::fs;

const KERNEL_HOSTNAME: &str = "/proc/sys/kernel/hostname";

pub trait IdentitySource {
    fn hostname(&self) -> String;
}

/// Reads `HOSTNAME`, then the kernel hostname, then falls back to `localhost`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdentity;

impl IdentitySource for SystemIdentity {
    fn hostname(&self) -> String {
        std::env::var("HOSTNAME")
            .ok()
            .or_else(|| fs::read_to_string(KERNEL_HOSTNAME).ok())
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }
}

/// A fixed hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIdentity(pub String);

impl IdentitySource for StaticIdentity {
    fn hostname(&self) -> String {
        self.0.clone()
    }
}
