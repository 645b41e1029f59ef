//! Test Helper Utilities
//!
//! Stub health endpoint and engine stand-ins shared by the launcher tests

#![allow(dead_code)]

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use talkgen_common::config::LauncherConfig;

/// Health endpoint that turns healthy on the `ready_on`-th request
pub struct StubHealth {
    pub port: u16,
    requests: Arc<AtomicU32>,
}

impl StubHealth {
    /// `None` never answers 200
    pub async fn start(ready_on: Option<u32>) -> Self {
        let requests = Arc::new(AtomicU32::new(0));
        let app = Router::new()
            .route("/server_status", get(health))
            .with_state((Arc::clone(&requests), ready_on));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub health server");
        let port = listener.local_addr().expect("stub address").port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub health server");
        });

        Self { port, requests }
    }

    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}

async fn health(State((requests, ready_on)): State<(Arc<AtomicU32>, Option<u32>)>) -> StatusCode {
    let n = requests.fetch_add(1, Ordering::SeqCst) + 1;
    match ready_on {
        Some(ready_on) if n >= ready_on => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Loopback port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind scratch listener");
    listener.local_addr().expect("scratch address").port()
}

/// Launcher config running `script` under sh; `--listen`/`--port` land in $1..$4
pub fn sh_engine(script: &str, port: u16, interval_ms: u64, timeout_secs: u64) -> LauncherConfig {
    LauncherConfig {
        program: PathBuf::from("sh"),
        script_args: vec!["-c".to_string(), script.to_string(), "engine".to_string()],
        working_dir: None,
        listen: "127.0.0.1".to_string(),
        port,
        health_path: "/server_status".to_string(),
        poll_interval_ms: interval_ms,
        startup_timeout_secs: timeout_secs,
    }
}

#[cfg(target_os = "linux")]
pub fn process_exists(pid: u32) -> bool {
    std::path::Path::new(&format!("/proc/{}", pid)).exists()
}

#[cfg(not(target_os = "linux"))]
pub fn process_exists(_pid: u32) -> bool {
    false
}
