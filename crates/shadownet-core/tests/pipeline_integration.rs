#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::panic)] // Integration tests use unwrap for brevity

//! Integration tests for the full connect pipeline.
//!
//! External tools are replaced by `sh -c` scripts and coreutils (`true`),
//! so no real `wg`, `wg-quick`, or `sudo` is needed.

use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use shadownet_core::cmd::CommandSpec;
use shadownet_core::{Error, KeyProvisioner, Session, SessionState, Settings, TunnelSupervisor};
use tokio_util::sync::CancellationToken;

const TWO_NODES: &str = r#"[
    {"ip": "185.186.78.1", "port": 51820, "public_key": "c2xvdw==", "country": "DE", "ping": 50},
    {"ip": "103.231.88.1", "port": 51821, "public_key": "ZmFzdA==", "country": "JP", "ping": 20}
]"#;

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new(directory: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bootstrap.json"), directory).unwrap();
        fs::create_dir(dir.path().join("config")).unwrap();
        Self { dir }
    }

    fn config_dir(&self) -> PathBuf {
        self.dir.path().join("config")
    }

    fn log(&self) -> PathBuf {
        self.dir.path().join("exec.log")
    }

    fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.directory = self.dir.path().join("bootstrap.json");
        settings
    }

    /// Key tools that log each invocation and emit fixed keys.
    fn provisioner(&self) -> KeyProvisioner {
        let log = self.log().display().to_string();
        KeyProvisioner::with_commands(
            CommandSpec::new(
                "sh",
                ["-c".to_string(), format!("echo genkey >> '{log}'; echo UFJJVg==")],
            ),
            CommandSpec::new(
                "sh",
                ["-c".to_string(), format!("echo pubkey >> '{log}'; read k; echo \"pub-$k\"")],
            ),
        )
    }

    /// Activation through a logging prefix around `true`.
    fn supervisor(&self) -> TunnelSupervisor {
        let log = self.log().display().to_string();
        TunnelSupervisor::new(
            "true",
            vec![
                "sh".into(),
                "-c".into(),
                format!("echo \"$@\" >> '{log}'"),
                "sh".into(),
            ],
        )
        .with_search_path(process_path())
    }

    fn session(&self) -> Session {
        Session::with_components(
            self.settings(),
            &self.config_dir(),
            self.provisioner(),
            self.supervisor(),
        )
    }

    fn exec_log(&self) -> String {
        fs::read_to_string(self.log()).unwrap_or_default()
    }

    fn config_files(&self) -> usize {
        fs::read_dir(self.config_dir()).unwrap().count()
    }
}

fn process_path() -> OsString {
    std::env::var_os("PATH").unwrap_or_else(|| OsString::from("/usr/bin:/bin"))
}

#[test]
fn lowest_ping_node_is_selected() {
    let fixture = Fixture::new(TWO_NODES);
    let mut session = fixture.session();

    let mut selected = None;
    session.connect(|node| selected = Some(node.clone())).unwrap();

    let selected = selected.unwrap();
    assert_eq!(selected.ping, 20);
    assert_eq!(selected.country, "JP");
}

#[test]
fn empty_directory_fails_selection_without_side_effects() {
    let fixture = Fixture::new("[]");
    let mut session = fixture.session();

    let err = session.connect(|_| panic!("nothing to select")).unwrap_err();
    assert!(matches!(err, Error::Selection), "got {err:?}");
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(fixture.exec_log(), "", "no key tool or activation may run");
    assert_eq!(fixture.config_files(), 0, "no config may be written");
}

#[test]
fn malformed_directory_fails_before_key_generation() {
    let fixture = Fixture::new(r#"[{"ip": "10.0.0.1", "port": 51820}]"#);
    let mut session = fixture.session();

    let err = session.connect(|_| {}).unwrap_err();
    assert!(matches!(err, Error::Parse { .. }), "got {err:?}");
    assert_eq!(fixture.exec_log(), "");
}

#[test]
fn key_generator_that_cannot_start_writes_no_config() {
    let fixture = Fixture::new(TWO_NODES);
    let mut session = Session::with_components(
        fixture.settings(),
        &fixture.config_dir(),
        KeyProvisioner::new("/nonexistent/shadownet-wg"),
        fixture.supervisor(),
    );

    let err = session.connect(|_| {}).unwrap_err();
    assert!(matches!(err, Error::KeyGen(_)), "got {err:?}");
    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(fixture.config_files(), 0);
    assert!(!fixture.exec_log().contains(" up "), "activation must not run");
}

#[test]
fn missing_tunnel_tool_keeps_written_config() {
    let fixture = Fixture::new(TWO_NODES);
    let empty_path = fixture.dir.path().join("empty-bin");
    fs::create_dir(&empty_path).unwrap();
    let mut session = Session::with_components(
        fixture.settings(),
        &fixture.config_dir(),
        fixture.provisioner(),
        TunnelSupervisor::new("wg-quick", vec!["sh".into(), "-c".into(), "exit 0".into()])
            .with_search_path(empty_path.as_os_str()),
    );

    let err = session.connect(|_| {}).unwrap_err();
    match err {
        Error::ToolMissing { program } => assert_eq!(program, "wg-quick"),
        other => panic!("expected ToolMissing, got {other:?}"),
    }
    // Already-written artifacts are not cleaned up.
    assert!(session.config_path().exists());
    assert_eq!(session.state(), SessionState::Terminated);
}

#[tokio::test]
async fn successful_run_writes_config_and_tears_down_on_cancel() {
    let fixture = Fixture::new(TWO_NODES);
    let mut session = fixture.session();

    let tunnel = session.connect(|_| {}).unwrap();
    assert_eq!(session.state(), SessionState::Active);

    let config_path = session.config_path().to_path_buf();
    assert_eq!(config_path, fixture.config_dir().join("wg0.conf"));
    let text = fs::read_to_string(&config_path).unwrap();

    assert_eq!(text.matches("[Interface]").count(), 1);
    assert_eq!(text.matches("[Peer]").count(), 1);
    assert!(text.contains("PrivateKey = UFJJVg==\n"), "{text}");
    assert!(text.contains("PublicKey = ZmFzdA==\n"), "{text}");
    assert!(text.contains("Endpoint = 103.231.88.1:51821\n"), "{text}");

    let mode = fs::metadata(&config_path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);

    let cancel = CancellationToken::new();
    cancel.cancel();
    session.supervise(tunnel, cancel).await;
    assert_eq!(session.state(), SessionState::Terminated);

    let log = fixture.exec_log();
    let expected = format!(
        "genkey\npubkey\ntrue up {0}\ntrue down {0}\n",
        config_path.display()
    );
    assert_eq!(log, expected);
}

#[test]
fn rerun_overwrites_previous_config() {
    let fixture = Fixture::new(TWO_NODES);
    let config_path = fixture.settings().config_path(&fixture.config_dir());
    fs::write(&config_path, "[Interface]\nPrivateKey = old\n".repeat(50)).unwrap();

    fixture.session().connect(|_| {}).unwrap();

    let text = fs::read_to_string(&config_path).unwrap();
    assert!(!text.contains("old"));
    assert_eq!(text.matches("[Interface]").count(), 1);
    assert_eq!(fixture.config_files(), 1);
}

#[test]
fn settings_file_customises_rendered_config() {
    let fixture = Fixture::new(TWO_NODES);
    fs::write(
        fixture.config_dir().join("settings.json"),
        r#"{"tunnel": {"interface": "shadow0", "dns": "9.9.9.9", "persistent_keepalive_secs": 10}}"#,
    )
    .unwrap();

    let mut settings = Settings::load(&fixture.config_dir()).unwrap();
    settings.directory = fixture.dir.path().join("bootstrap.json");
    let mut session = Session::with_components(
        settings,
        &fixture.config_dir(),
        fixture.provisioner(),
        fixture.supervisor(),
    );
    session.connect(|_| {}).unwrap();

    let path: &Path = session.config_path();
    assert!(path.ends_with("shadow0.conf"));
    let text = fs::read_to_string(path).unwrap();
    assert!(text.contains("DNS = 9.9.9.9\n"));
    assert!(text.contains("PersistentKeepalive = 10\n"));
    assert!(text.contains("Address = 10.0.0.2/24\n"));
}
