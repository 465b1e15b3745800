//! Tunnel configuration rendering.
//!
//! Produces a `wg-quick` style document with one `[Interface]` block for
//! this session and one `[Peer]` block for the selected relay.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::keys::KeyPair;
use crate::node::Node;
use crate::settings::TunnelSettings;

/// A fully rendered tunnel config document.
#[derive(Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    text: String,
}

impl TunnelConfig {
    /// Render the document. Only callable with both a node and a key pair,
    /// so a config with a missing key or peer cannot be produced.
    pub fn render(node: &Node, keys: &KeyPair, tunnel: &TunnelSettings) -> Self {
        let text = format!(
            "[Interface]
PrivateKey = {private_key}
Address = {address}
DNS = {dns}

[Peer]
PublicKey = {peer_key}
Endpoint = {endpoint}
AllowedIPs = {allowed_ips}
PersistentKeepalive = {keepalive}
",
            private_key = keys.private.expose(),
            address = tunnel.address,
            dns = tunnel.dns,
            peer_key = node.public_key,
            endpoint = node.endpoint(),
            allowed_ips = tunnel.allowed_ips,
            keepalive = tunnel.persistent_keepalive_secs,
        );
        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Write the document to `path`, replacing any previous content.
    ///
    /// The text goes to an owner-only temporary file in the same directory
    /// which is then renamed over `path`, so the target is either the old
    /// document or the complete new one. The temporary file is removed on
    /// every failure path.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let map_err = |source| Error::ConfigWrite {
            path: path.to_path_buf(),
            source,
        };
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = tempfile::Builder::new()
            .prefix(".shadownet-")
            .suffix(".conf.tmp")
            .tempfile_in(dir)
            .map_err(map_err)?;
        restrict_permissions(tmp.path()).map_err(map_err)?;
        tmp.write_all(self.text.as_bytes()).map_err(map_err)?;
        tmp.as_file().sync_all().map_err(map_err)?;
        tmp.persist(path).map_err(|e| map_err(e.error))?;

        tracing::info!(path = %path.display(), "wrote tunnel config");
        Ok(())
    }
}

impl std::fmt::Debug for TunnelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelConfig").finish_non_exhaustive()
    }
}

/// Restrict file permissions to owner-only read/write (0600) on unix.
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    fs::metadata(path).map(|_| ())
}
