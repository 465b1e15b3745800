//! Relay directory loading.
//!
//! The directory is a JSON array of [`Node`] records produced elsewhere.
//! Loading is all-or-nothing: a single malformed record rejects the file.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::node::Node;

/// Read and parse the relay directory at `path`.
pub fn load_directory(path: &Path) -> Result<Vec<Node>> {
    let content = fs::read_to_string(path).map_err(|source| Error::Load {
        path: path.to_path_buf(),
        source,
    })?;
    let nodes = parse_directory(&content, path)?;
    tracing::info!(path = %path.display(), count = nodes.len(), "loaded relay directory");
    Ok(nodes)
}

/// Parse directory contents. `path` is only used for error context.
pub fn parse_directory(content: &str, path: &Path) -> Result<Vec<Node>> {
    let parse_err = |reason: String| Error::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let nodes: Vec<Node> = serde_json::from_str(content).map_err(|e| parse_err(e.to_string()))?;
    for (index, node) in nodes.iter().enumerate() {
        node.validate()
            .map_err(|reason| parse_err(format!("record {index}: {reason}")))?;
    }
    Ok(nodes)
}
