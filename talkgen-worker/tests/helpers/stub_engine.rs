//! Stub execution engine
//!
//! Serves `POST /queue/job` on an ephemeral loopback port with a canned
//! status and body, and records every submitted request body.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use talkgen_common::config::EngineConfig;

/// Loopback URL with nothing listening on it
///
/// Binds an ephemeral port and releases it, so the address is known to be free.
pub fn unused_engine_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind scratch listener");
    let addr = listener.local_addr().expect("scratch address");
    format!("http://{}", addr)
}

#[derive(Clone)]
struct StubState {
    status: StatusCode,
    body: String,
    received: Arc<Mutex<Vec<Value>>>,
}

/// Running stub engine
pub struct StubEngine {
    pub base_url: String,
    received: Arc<Mutex<Vec<Value>>>,
}

impl StubEngine {
    /// Start a stub that answers every submission with `status` and `body`
    pub async fn start(status: u16, body: &str) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            status: StatusCode::from_u16(status).expect("valid status"),
            body: body.to_string(),
            received: Arc::clone(&received),
        };

        let app = Router::new()
            .route("/queue/job", post(accept_job))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub engine");
        let addr = listener.local_addr().expect("stub engine address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub engine server");
        });

        Self {
            base_url: format!("http://{}", addr),
            received,
        }
    }

    /// Engine config pointing at this stub
    pub fn config(&self) -> EngineConfig {
        engine_config(&self.base_url)
    }

    /// Request bodies received so far
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().expect("stub lock").clone()
    }
}

/// Engine config with a fixed client id
pub fn engine_config(base_url: &str) -> EngineConfig {
    EngineConfig {
        base_url: base_url.to_string(),
        client_id: "test-client".to_string(),
        request_timeout: Some(Duration::from_secs(10)),
    }
}

async fn accept_job(State(state): State<StubState>, Json(body): Json<Value>) -> (StatusCode, String) {
    state.received.lock().expect("stub lock").push(body);
    (state.status, state.body.clone())
}
