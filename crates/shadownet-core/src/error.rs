//! Error types for the `ShadowNet` connect pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using `ShadowNet` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the pipeline can report. All of them are fatal.
#[derive(Debug, Error)]
pub enum Error {
    /// The per-user configuration directory could not be created
    #[error("Failed to create config directory {}: {source}", path.display())]
    ConfigDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The settings file exists but could not be read or parsed
    #[error("Invalid settings file {}: {reason}", path.display())]
    Settings { path: PathBuf, reason: String },

    /// The relay directory could not be opened or read
    #[error("Failed to read relay directory {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The relay directory is not a well-formed list of nodes
    #[error("Failed to parse relay directory {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// No candidate node to connect to
    #[error("No available nodes found")]
    Selection,

    /// Key generation or derivation failed
    #[error("Key generation failed: {0}")]
    KeyGen(String),

    /// The tunnel config could not be written
    #[error("Failed to write tunnel config {}: {source}", path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The activation utility is not on PATH
    #[error("{program} is not installed (not found on PATH)")]
    ToolMissing { program: String },

    /// The activation command could not be started or exited non-zero
    #[error("Tunnel activation failed: {0}")]
    Activation(String),
}
