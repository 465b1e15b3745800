//! Tunnel activation and supervision.
//!
//! Activation is delegated to `wg-quick up <config>`, run with elevated
//! privileges. Once up, the session is parked on a cancellation token;
//! when it fires, the tunnel is torn down with `wg-quick down <config>`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::cmd::{CommandSpec, find_in_path, run_cmd};
use crate::error::{Error, Result};
use crate::privilege;
use crate::settings::ToolSettings;

/// Checks for, starts, and stops the external tunnel utility.
#[derive(Debug, Clone)]
pub struct TunnelSupervisor {
    tool: String,
    prefix: Vec<String>,
    /// PATH used to resolve `tool`; `None` means the process PATH.
    search_path: Option<OsString>,
}

impl TunnelSupervisor {
    /// Supervisor for the configured `wg-quick`, elevated via the configured
    /// prefix unless the process already runs as root.
    pub fn from_settings(tools: &ToolSettings) -> Self {
        Self::new(&tools.wg_quick, privilege::effective_prefix(&tools.privilege))
    }

    /// Supervisor running `<prefix...> <tool> up|down <config>` verbatim.
    pub fn new(tool: &str, prefix: Vec<String>) -> Self {
        Self {
            tool: tool.to_string(),
            prefix,
            search_path: None,
        }
    }

    /// Resolve the tool against `search_path` instead of the process PATH.
    #[must_use]
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    /// Fail with [`Error::ToolMissing`] unless the tool is on the search path.
    pub fn ensure_tool(&self) -> Result<PathBuf> {
        let path_var = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"))
            .unwrap_or_default();
        let resolved = find_in_path(&self.tool, &path_var).ok_or_else(|| Error::ToolMissing {
            program: self.tool.clone(),
        })?;
        tracing::debug!(tool = %resolved.display(), "found tunnel utility");
        Ok(resolved)
    }

    /// Bring the tunnel up from the config at `config_path`.
    ///
    /// Nothing is executed when the tool is missing.
    pub fn activate(&self, config_path: &Path) -> Result<ActiveTunnel> {
        self.ensure_tool()?;

        let up = self.command("up", config_path);
        run_cmd(
            &format!("activating tunnel from {}", config_path.display()),
            &up,
        )
        .map_err(|e| Error::Activation(format!("{up}: {e}")))?;

        tracing::info!(config = %config_path.display(), "tunnel is up");
        Ok(ActiveTunnel {
            down: self.command("down", config_path),
        })
    }

    fn command(&self, action: &str, config_path: &Path) -> CommandSpec {
        CommandSpec::new(
            self.tool.as_str(),
            [OsString::from(action), config_path.as_os_str().to_owned()],
        )
        .prefixed(&self.prefix)
    }
}

/// A tunnel that has been brought up and must be brought down again.
#[derive(Debug)]
pub struct ActiveTunnel {
    down: CommandSpec,
}

impl ActiveTunnel {
    /// Park until `cancel` fires, then tear the tunnel down.
    pub async fn supervise(self, cancel: CancellationToken) {
        tracing::info!("tunnel active, waiting for shutdown signal");
        cancel.cancelled().await;
        tracing::info!("shutdown requested");
        self.deactivate().await;
    }

    /// Tear the tunnel down. Failure is logged, not returned: the process
    /// is exiting either way.
    pub async fn deactivate(self) {
        let down = self.down;
        let result = tokio::task::spawn_blocking(move || {
            run_cmd("deactivating tunnel", &down).map_err(|e| format!("{down}: {e}"))
        })
        .await;

        match result {
            Ok(Ok(_)) => tracing::info!("tunnel is down"),
            Ok(Err(e)) => tracing::warn!("failed to deactivate tunnel: {e}"),
            Err(e) => tracing::warn!("deactivation task failed: {e}"),
        }
    }
}
