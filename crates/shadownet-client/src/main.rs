//! `ShadowNet` client
//!
//! Connects to the lowest-latency relay from the bootstrap directory and
//! keeps the tunnel up until interrupted.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use shadownet_core::settings::{self, Settings};
use shadownet_core::tracing_init::init_tracing;
use shadownet_core::Session;

#[derive(Parser, Debug)]
#[command(name = "shadownet")]
#[command(version, about = "ShadowNet client - connect to the fastest relay")]
struct Args {
    /// Relay directory file (JSON array of nodes)
    #[arg(long, env = "SHADOWNET_DIRECTORY")]
    directory: Option<PathBuf>,

    /// Configuration directory (default: ~/.shadownet)
    #[arg(long, env = "SHADOWNET_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "SHADOWNET_LOG_JSON")]
    log_json: bool,
}

#[tokio::main(flavor = "current_thread")]
#[allow(clippy::print_stderr)]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing("shadownet=info", args.log_json);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("shadownet: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::print_stdout)]
async fn run(args: Args) -> anyhow::Result<()> {
    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => settings::default_config_dir()?,
    };
    settings::ensure_config_dir(&config_dir)?;

    let mut settings = Settings::load(&config_dir)?;
    if let Some(directory) = args.directory {
        settings.directory = directory;
    }

    let mut session = Session::new(settings, &config_dir);
    let tunnel = session.connect(|node| {
        println!(
            "Connecting to node in {} (ping: {}ms)",
            node.country, node.ping
        );
    })?;

    println!("Connected to ShadowNet!");
    println!("Press Ctrl+C to disconnect");

    let cancel = CancellationToken::new();
    if let Err(e) = spawn_signal_listener(cancel.clone()) {
        // Without a way to be interrupted, bring the tunnel straight back down.
        cancel.cancel();
        session.supervise(tunnel, cancel).await;
        return Err(e.context("failed to install shutdown signal handlers"));
    }
    session.supervise(tunnel, cancel).await;

    info!("ShadowNet client stopped");
    Ok(())
}

/// Cancel `cancel` on Ctrl+C or (unix) SIGTERM.
fn spawn_signal_listener(cancel: CancellationToken) -> anyhow::Result<()> {
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        #[cfg(unix)]
        let sigterm_future = async move {
            sigterm.recv().await;
        };
        #[cfg(not(unix))]
        let sigterm_future = std::future::pending::<()>();

        wait_for_shutdown(tokio::signal::ctrl_c(), sigterm_future).await;
        cancel.cancel();
    });
    Ok(())
}

/// Resolve on Ctrl+C or on `terminate`. If the Ctrl+C handler cannot be
/// installed, only `terminate` ends the wait.
async fn wait_for_shutdown(
    ctrl_c: impl Future<Output = std::io::Result<()>>,
    terminate: impl Future<Output = ()>,
) {
    tokio::pin!(terminate);

    let ctrl_c_unavailable = tokio::select! {
        result = ctrl_c => match result {
            Ok(()) => {
                info!("Received Ctrl+C shutdown signal");
                false
            }
            Err(e) => {
                warn!("failed to listen for Ctrl+C, waiting for SIGTERM only: {e}");
                true
            }
        },
        () = &mut terminate => {
            info!("Received SIGTERM shutdown signal");
            false
        }
    };

    if ctrl_c_unavailable {
        terminate.await;
        info!("Received SIGTERM shutdown signal");
    }
}
