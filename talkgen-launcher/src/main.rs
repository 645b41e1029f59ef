//! talkgen-launcher - Execution engine launcher
//!
//! Spawns the execution engine, waits until its health endpoint answers and
//! keeps it running until SIGINT/SIGTERM. The engine is always stopped
//! before the launcher exits.
//!
//! Exit codes: 0 after a requested shutdown, 1 on any failure.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use talkgen_common::config::load_toml_config;
use talkgen_launcher::{ProcessSupervisor, SupervisorError};

/// Command-line arguments for talkgen-launcher
#[derive(Parser, Debug)]
#[command(name = "talkgen-launcher")]
#[command(about = "Starts and supervises the execution engine process")]
#[command(version)]
struct Args {
    /// Config file path (overrides TALKGEN_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Engine port (overrides [launcher] port)
    #[arg(short, long, env = "TALKGEN_ENGINE_PORT")]
    port: Option<u16>,

    /// Seconds to wait for the engine health check
    #[arg(long, env = "TALKGEN_STARTUP_TIMEOUT")]
    startup_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("talkgen-launcher failed: {:#}", e);
            eprintln!("talkgen-launcher failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_toml_config(args.config.as_deref())?;
    talkgen_common::logging::init_tracing(&toml_config.logging)?;

    info!(
        "Starting talkgen-launcher v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut launcher = toml_config.launcher;
    if let Some(port) = args.port {
        launcher.port = port;
    }
    if let Some(secs) = args.startup_timeout {
        launcher.startup_timeout_secs = secs;
    }

    let cancel = CancellationToken::new();
    tokio::spawn(watch_signals(cancel.clone()));

    let mut supervisor = ProcessSupervisor::new(launcher, cancel)?;
    let result = supervise(&mut supervisor).await;

    // Every path, including errors, ends here
    supervisor.cleanup().await;

    match result {
        Ok(()) | Err(SupervisorError::Cancelled) => {
            info!("Launcher shutdown complete");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn supervise(supervisor: &mut ProcessSupervisor) -> Result<(), SupervisorError> {
    let handle = supervisor.start().await?;
    info!(pid = ?handle.pid(), "Engine ready, supervising until shutdown");
    supervisor.monitor().await
}

/// Cancel `token` on Ctrl+C or SIGTERM
async fn watch_signals(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }

    token.cancel();
}
