//! talkgen-worker library
//!
//! Compiles talking-head generation requests into engine node graphs and
//! submits them to the execution engine.

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod graph;
pub mod handler;
pub mod params;
pub mod submission;

pub use handler::{HandlerResponse, JobHandler};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Request handler (read-only, shared by all requests)
    pub handler: Arc<JobHandler>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(handler: JobHandler) -> Self {
        Self {
            handler: Arc::new(handler),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::job_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
