//! Ephemeral session key provisioning.
//!
//! Keys come from the external `wg` tool: `wg genkey` produces a private
//! key, which is streamed over a pipe into `wg pubkey` to derive the public
//! half. Nothing is staged on disk and nothing is cached between runs.

use std::fmt;
use std::io::Write;
use std::process::Stdio;

use crate::cmd::{ChildGuard, CmdError, CommandSpec, check_output};
use crate::error::{Error, Result};
use crate::settings::ToolSettings;

/// Session private key (base64 text as printed by `wg genkey`).
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(String);

impl PrivateKey {
    /// The key text, for rendering into the tunnel config only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([redacted])")
    }
}

/// Session public key (base64 text as printed by `wg pubkey`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(String);

impl PublicKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key pair (private + public)
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub private: PrivateKey,
    pub public: PublicKey,
}

impl KeyPair {
    /// Assemble a key pair from known key text.
    pub fn from_parts(private: impl Into<String>, public: impl Into<String>) -> Self {
        Self {
            private: PrivateKey(private.into()),
            public: PublicKey(public.into()),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// Generates key pairs by running the generator and deriver commands.
#[derive(Debug, Clone)]
pub struct KeyProvisioner {
    genkey: CommandSpec,
    pubkey: CommandSpec,
}

impl KeyProvisioner {
    /// Use `<wg> genkey` and `<wg> pubkey`.
    pub fn new(wg: &str) -> Self {
        Self::with_commands(
            CommandSpec::new(wg, ["genkey"]),
            CommandSpec::new(wg, ["pubkey"]),
        )
    }

    pub fn from_settings(tools: &ToolSettings) -> Self {
        Self::new(&tools.wg)
    }

    /// Use arbitrary generator/deriver commands. The deriver reads the
    /// private key on stdin and prints the public key on stdout.
    pub const fn with_commands(genkey: CommandSpec, pubkey: CommandSpec) -> Self {
        Self { genkey, pubkey }
    }

    /// Generate a fresh key pair.
    pub fn provision(&self) -> Result<KeyPair> {
        let private = self.generate_private()?;
        let public = self.derive_public(&private)?;
        tracing::info!(public_key = %public, "provisioned session key pair");
        Ok(KeyPair { private, public })
    }

    fn generate_private(&self) -> Result<PrivateKey> {
        tracing::debug!("exec: {}", self.genkey);
        let output = self
            .genkey
            .to_command()
            .output()
            .map_err(|e| keygen_error(&self.genkey, &CmdError::Spawn(e)))?;
        let output =
            check_output(&self.genkey, output).map_err(|e| keygen_error(&self.genkey, &e))?;
        non_empty(&self.genkey, &output.stdout).map(PrivateKey)
    }

    fn derive_public(&self, private: &PrivateKey) -> Result<PublicKey> {
        tracing::debug!("exec: {} (private key on stdin)", self.pubkey);
        let child = self
            .pubkey
            .to_command()
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| keygen_error(&self.pubkey, &CmdError::Spawn(e)))?;
        // From here on the guard kills and reaps the child on every early return.
        let mut guard = ChildGuard::new(child);

        let stdin = guard
            .child_mut()
            .and_then(|child| child.stdin.take())
            .ok_or_else(|| Error::KeyGen(format!("{}: stdin pipe unavailable", self.pubkey)))?;
        // The pipe closes when `stdin` is dropped at the end of this call,
        // which is the deriver's end-of-input.
        let write_result = write_key(stdin, private);

        let output = guard
            .wait_with_output()
            .map_err(|e| Error::KeyGen(format!("{}: {e}", self.pubkey)))?;
        let output =
            check_output(&self.pubkey, output).map_err(|e| keygen_error(&self.pubkey, &e))?;
        write_result
            .map_err(|e| Error::KeyGen(format!("{}: writing private key: {e}", self.pubkey)))?;

        non_empty(&self.pubkey, &output.stdout).map(PublicKey)
    }
}

fn write_key(mut stdin: std::process::ChildStdin, private: &PrivateKey) -> std::io::Result<()> {
    stdin.write_all(private.expose().as_bytes())?;
    stdin.write_all(b"\n")?;
    stdin.flush()
}

fn keygen_error(spec: &CommandSpec, err: &CmdError) -> Error {
    Error::KeyGen(format!("{spec}: {err}"))
}

/// Key tools end their output with a newline; anything else around the key
/// is whitespace too. An empty result means the tool produced no key.
fn non_empty(spec: &CommandSpec, stdout: &[u8]) -> Result<String> {
    let text = String::from_utf8_lossy(stdout).trim().to_string();
    if text.is_empty() {
        return Err(Error::KeyGen(format!("{spec}: produced no output")));
    }
    Ok(text)
}
