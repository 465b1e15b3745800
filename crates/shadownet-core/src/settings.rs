//! Client settings.
//!
//! Resolution order (lowest to highest):
//! 1. Built-in defaults
//! 2. `~/.shadownet/settings.json` (optional)
//! 3. Environment variables and CLI arguments, applied by the binary

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the per-user configuration directory under `$HOME`.
pub const CONFIG_DIR_NAME: &str = ".shadownet";

/// Name of the optional settings file inside the configuration directory.
pub const SETTINGS_FILENAME: &str = "settings.json";

/// Complete client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Relay directory file. Relative paths resolve against the working directory.
    pub directory: PathBuf,
    pub tunnel: TunnelSettings,
    pub tools: ToolSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("../bootstrap/bootstrap.json"),
            tunnel: TunnelSettings::default(),
            tools: ToolSettings::default(),
        }
    }
}

/// Values rendered into the local interface and peer blocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TunnelSettings {
    /// Interface name; the config file is `<config_dir>/<interface>.conf`.
    pub interface: String,
    /// Local overlay address in CIDR notation.
    pub address: String,
    /// DNS resolver used inside the tunnel.
    pub dns: String,
    /// Routing range sent through the peer.
    pub allowed_ips: String,
    pub persistent_keepalive_secs: u16,
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self {
            interface: "wg0".to_string(),
            address: "10.0.0.2/24".to_string(),
            dns: "1.1.1.1".to_string(),
            allowed_ips: "0.0.0.0/0".to_string(),
            persistent_keepalive_secs: 25,
        }
    }
}

/// External programs the pipeline shells out to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolSettings {
    /// Key tool providing `genkey` and `pubkey`.
    pub wg: String,
    /// Tunnel activation utility providing `up` and `down`.
    pub wg_quick: String,
    /// Command prefix used to elevate activation. Skipped when already root.
    pub privilege: Vec<String>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            wg: "wg".to_string(),
            wg_quick: "wg-quick".to_string(),
            privilege: vec!["sudo".to_string()],
        }
    }
}

impl Settings {
    /// Load settings from `<config_dir>/settings.json`.
    ///
    /// A missing file yields the defaults; a present but unreadable or
    /// malformed file is an error.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(SETTINGS_FILENAME);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::Settings {
                    path,
                    reason: e.to_string(),
                });
            }
        };
        let settings = serde_json::from_str(&content).map_err(|e| Error::Settings {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "loaded settings file");
        Ok(settings)
    }

    /// Path of the rendered tunnel config inside `config_dir`.
    pub fn config_path(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(format!("{}.conf", self.tunnel.interface))
    }
}

/// Default configuration directory: `~/.shadownet`.
pub fn default_config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| Error::ConfigDir {
        path: PathBuf::from("~").join(CONFIG_DIR_NAME),
        source: io::Error::new(io::ErrorKind::NotFound, "cannot determine home directory"),
    })?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Create the configuration directory if needed, restricted to the owner (0700).
pub fn ensure_config_dir(path: &Path) -> Result<()> {
    let map_err = |source| Error::ConfigDir {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(path).map_err(map_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700)).map_err(map_err)?;
    }
    Ok(())
}
