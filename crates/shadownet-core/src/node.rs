//! Relay node records.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// A candidate relay as listed in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Host address (IP literal or hostname).
    pub ip: String,
    /// UDP port of the relay's tunnel endpoint.
    pub port: u16,
    /// Relay's tunnel public key (base64, opaque here).
    pub public_key: String,
    /// Country label, informational only.
    pub country: String,
    /// Round-trip latency in milliseconds.
    pub ping: u32,
}

impl Node {
    /// Check the fields serde cannot enforce by type alone.
    pub fn validate(&self) -> Result<(), String> {
        if self.ip.is_empty() {
            return Err("ip must not be empty".to_string());
        }
        if self.ip.parse::<IpAddr>().is_err() && !is_valid_hostname(&self.ip) {
            return Err(format!("ip {:?} is neither an IP address nor a hostname", self.ip));
        }
        if self.port == 0 {
            return Err("port must be in 1..=65535".to_string());
        }
        if self.public_key.is_empty() {
            return Err("public_key must not be empty".to_string());
        }
        Ok(())
    }

    /// The `host:port` endpoint as written into the peer block.
    ///
    /// IPv6 literals are bracketed; everything else is used verbatim.
    pub fn endpoint(&self) -> String {
        match self.ip.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => format!("[{}]:{}", self.ip, self.port),
            _ => format!("{}:{}", self.ip, self.port),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {} ({}ms)", self.endpoint(), self.country, self.ping)
    }
}

/// RFC 1123 hostname syntax: dot-separated labels of alphanumerics and
/// hyphens, 1..=63 chars each, no leading/trailing hyphen, 253 chars total.
fn is_valid_hostname(host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}
