//! `ShadowNet` Core Library
//!
//! The connect pipeline for the `ShadowNet` client:
//! - Relay directory loading and validation
//! - Lowest-latency node selection
//! - Ephemeral key provisioning through the external `wg` tool
//! - Tunnel configuration rendering
//! - Tunnel activation and supervision through `wg-quick`

pub mod cmd;
pub mod directory;
pub mod error;
pub mod keys;
pub mod node;
pub mod privilege;
pub mod render;
pub mod selector;
pub mod session;
pub mod settings;
pub mod tracing_init;
pub mod tunnel;

pub use error::{Error, Result};
pub use keys::{KeyPair, KeyProvisioner, PrivateKey};
pub use node::Node;
pub use session::{Session, SessionState};
pub use settings::Settings;
pub use tunnel::TunnelSupervisor;
