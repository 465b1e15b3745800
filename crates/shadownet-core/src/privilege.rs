use nix::unistd::geteuid;

/// Check if the current process is running as root.
pub fn is_root() -> bool {
    geteuid().is_root()
}

/// The prefix to run privileged commands with: none when already root,
/// otherwise the configured elevation command (normally `sudo`).
pub fn effective_prefix(configured: &[String]) -> Vec<String> {
    prefix_for(configured, is_root())
}

fn prefix_for(configured: &[String], root: bool) -> Vec<String> {
    if root {
        tracing::debug!("running as root, no privilege prefix needed");
        Vec::new()
    } else {
        configured.to_vec()
    }
}
