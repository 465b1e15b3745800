//! Subprocess helpers shared by key provisioning and tunnel supervision.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};

/// A program plus its arguments, kept as data so it can be logged,
/// prefixed (e.g. with `sudo`), and swapped out in tests.
///
/// Arguments are `OsString`s so paths reach the child byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Prepend `prefix` (program first) in front of this command.
    #[must_use]
    pub fn prefixed(self, prefix: &[String]) -> Self {
        let Some((program, rest)) = prefix.split_first() else {
            return self;
        };
        let mut args: Vec<OsString> = rest.iter().map(OsString::from).collect();
        args.push(self.program.into());
        args.extend(self.args);
        Self {
            program: program.clone(),
            args,
        }
    }

    /// Build a `std::process::Command` with stdin closed and output captured.
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Why a subprocess did not complete successfully.
///
/// `Display` is always a single line: only the last non-empty line of the
/// child's stderr is shown. The full stderr is logged by [`check_output`].
#[derive(Debug, thiserror::Error)]
pub enum CmdError {
    /// The process could not be started.
    #[error("failed to start: {0}")]
    Spawn(#[source] std::io::Error),

    /// The process ran and exited unsuccessfully.
    #[error("{status}{}", stderr_summary(.stderr))]
    Failed { status: ExitStatus, stderr: String },
}

fn stderr_summary(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(|line| format!(": {line}"))
        .unwrap_or_default()
}

/// Execute a command with logging. Logs the full command line at debug level
/// and a human-friendly description at info level.
pub fn run_cmd(description: &str, spec: &CommandSpec) -> Result<Output, CmdError> {
    tracing::info!("{description}");
    tracing::debug!("exec: {spec}");

    let output = spec.to_command().output().map_err(CmdError::Spawn)?;
    check_output(spec, output)
}

/// Turn a non-zero exit into [`CmdError::Failed`], logging captured stderr.
pub fn check_output(spec: &CommandSpec, output: Output) -> Result<Output, CmdError> {
    if output.status.success() {
        return Ok(output);
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    tracing::error!("command failed: {spec}\nstderr: {stderr}");
    Err(CmdError::Failed {
        status: output.status,
        stderr,
    })
}

/// Owns a spawned child and guarantees it is reaped.
///
/// Dropping the guard before [`ChildGuard::wait_with_output`] kills the
/// child and waits for it, which also closes any pipes still attached.
#[derive(Debug)]
pub struct ChildGuard {
    child: Option<Child>,
}

impl ChildGuard {
    pub const fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    /// Mutable access to the child, e.g. to take its stdin.
    pub fn child_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }

    /// Wait for exit and collect output, releasing the guard.
    pub fn wait_with_output(mut self) -> std::io::Result<Output> {
        match self.child.take() {
            Some(child) => child.wait_with_output(),
            None => Err(std::io::Error::other("child already released")),
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                tracing::debug!("kill on drop: {e}");
            }
            if let Err(e) = child.wait() {
                tracing::debug!("wait on drop: {e}");
            }
        }
    }
}

/// Resolve `program` against an explicit PATH-style search list.
///
/// A program containing a path separator is checked directly instead.
pub fn find_in_path(program: &str, path_var: &OsStr) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    if program.contains(std::path::MAIN_SEPARATOR) {
        let candidate = PathBuf::from(program);
        return is_executable(&candidate).then_some(candidate);
    }
    std::env::split_paths(path_var)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file())
}
