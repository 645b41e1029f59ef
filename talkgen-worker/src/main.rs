//! talkgen-worker - Generation request worker
//!
//! Accepts talking-head generation requests over HTTP, compiles each into an
//! engine node graph and submits it to the execution engine.
//!
//! Startup fails fast when no engine base URL is configured.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;

use talkgen_common::config::{load_toml_config, EngineConfig};
use talkgen_worker::graph::{TemplateSettings, TEMPLATE_VERSION};
use talkgen_worker::{build_router, AppState, JobHandler};

/// Command-line arguments for talkgen-worker
#[derive(Parser, Debug)]
#[command(name = "talkgen-worker")]
#[command(about = "Compiles generation requests and submits them to the execution engine")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000", env = "TALKGEN_WORKER_PORT")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", env = "TALKGEN_WORKER_BIND")]
    bind: String,

    /// Engine base URL (overrides TALKGEN_ENGINE_URL and the config file)
    #[arg(long)]
    engine_url: Option<String>,

    /// Config file path (overrides TALKGEN_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_toml_config(args.config.as_deref())?;
    talkgen_common::logging::init_tracing(&toml_config.logging)?;

    info!(
        "Starting talkgen-worker v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Step 1: Resolve engine endpoint (required)
    let engine = EngineConfig::resolve(args.engine_url.as_deref(), &toml_config)
        .context("Engine endpoint configuration")?;
    info!("Engine submit URL: {}/queue/job", engine.base_url);
    info!("Client id: {}", engine.client_id);

    // Step 2: Graph template settings
    let template = TemplateSettings::from_table(&toml_config.template)?;
    info!("Graph template: {}", TEMPLATE_VERSION);

    // Step 3: Request handler and router
    let handler = JobHandler::new(&engine, toml_config.defaults.clone(), template)
        .context("Failed to create submission client")?;
    let app = build_router(AppState::new(handler));

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", args.bind, args.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("talkgen-worker listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}
