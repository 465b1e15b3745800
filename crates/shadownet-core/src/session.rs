//! The connect pipeline.
//!
//! Loader -> Selector -> Provisioner -> Renderer -> Supervisor, strictly in
//! that order. The first failure ends the session; nothing already written
//! is rolled back.

use std::fmt;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::directory::load_directory;
use crate::error::{Error, Result};
use crate::keys::KeyProvisioner;
use crate::node::Node;
use crate::render::TunnelConfig;
use crate::selector::select_fastest;
use crate::settings::Settings;
use crate::tunnel::{ActiveTunnel, TunnelSupervisor};

/// Where a session is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    DirectoryLoaded,
    NodeSelected,
    KeyProvisioned,
    ConfigWritten,
    Active,
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::DirectoryLoaded => "directory-loaded",
            Self::NodeSelected => "node-selected",
            Self::KeyProvisioned => "key-provisioned",
            Self::ConfigWritten => "config-written",
            Self::Active => "active",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// One connect attempt, from directory load to tunnel teardown.
pub struct Session {
    settings: Settings,
    config_path: PathBuf,
    provisioner: KeyProvisioner,
    supervisor: TunnelSupervisor,
    state: SessionState,
}

impl Session {
    /// Session using the tools named in `settings`.
    pub fn new(settings: Settings, config_dir: &Path) -> Self {
        let provisioner = KeyProvisioner::from_settings(&settings.tools);
        let supervisor = TunnelSupervisor::from_settings(&settings.tools);
        Self::with_components(settings, config_dir, provisioner, supervisor)
    }

    /// Session with explicit provisioner and supervisor.
    pub fn with_components(
        settings: Settings,
        config_dir: &Path,
        provisioner: KeyProvisioner,
        supervisor: TunnelSupervisor,
    ) -> Self {
        let config_path = settings.config_path(config_dir);
        Self {
            settings,
            config_path,
            provisioner,
            supervisor,
            state: SessionState::Idle,
        }
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Where the tunnel config is (or will be) written.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Run the pipeline up to an active tunnel.
    ///
    /// `on_selected` is called once the relay is chosen, before any key is
    /// generated.
    pub fn connect(&mut self, on_selected: impl FnOnce(&Node)) -> Result<ActiveTunnel> {
        let result = self.run_pipeline(on_selected);
        if let Err(e) = &result {
            tracing::debug!(state = %self.state, "pipeline aborted: {e}");
            self.transition(SessionState::Terminated);
        }
        result
    }

    /// Keep the tunnel up until `cancel` fires, then tear it down.
    pub async fn supervise(&mut self, tunnel: ActiveTunnel, cancel: CancellationToken) {
        tunnel.supervise(cancel).await;
        self.transition(SessionState::Terminated);
    }

    fn run_pipeline(&mut self, on_selected: impl FnOnce(&Node)) -> Result<ActiveTunnel> {
        let nodes = load_directory(&self.settings.directory)?;
        self.transition(SessionState::DirectoryLoaded);

        let node = select_fastest(&nodes).ok_or(Error::Selection)?;
        tracing::info!(
            ip = %node.ip,
            port = node.port,
            country = %node.country,
            ping_ms = node.ping,
            "selected fastest node"
        );
        self.transition(SessionState::NodeSelected);
        on_selected(node);

        let keys = self.provisioner.provision()?;
        self.transition(SessionState::KeyProvisioned);

        TunnelConfig::render(node, &keys, &self.settings.tunnel).write_to(&self.config_path)?;
        self.transition(SessionState::ConfigWritten);

        let tunnel = self.supervisor.activate(&self.config_path)?;
        self.transition(SessionState::Active);
        Ok(tunnel)
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = %self.state, to = %next, "session state");
        self.state = next;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config_path", &self.config_path)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
