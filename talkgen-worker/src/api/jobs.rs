//! Generation job endpoint
//!
//! `POST /run` takes a request envelope `{ "input": {...} }` and answers with
//! the handler response body. The status code mirrors the failure category;
//! the body carries the structured error either way.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::Value;

use crate::handler::{FailureKind, HandlerResponse};
use crate::AppState;

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> Response {
        let status = match self.failure_kind() {
            None => StatusCode::OK,
            Some(FailureKind::NoInput) | Some(FailureKind::Validation) => StatusCode::BAD_REQUEST,
            Some(FailureKind::Transport)
            | Some(FailureKind::Engine)
            | Some(FailureKind::InvalidResponse) => StatusCode::BAD_GATEWAY,
            Some(FailureKind::GraphIntegrity) | Some(FailureKind::Internal) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(self)).into_response()
    }
}

/// POST /run
pub async fn run_job(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> HandlerResponse {
    match body {
        Ok(Json(event)) => state.handler.handle_event(&event).await,
        Err(rejection) => HandlerResponse::Failure {
            error: format!("Invalid request body: {}", rejection.body_text()),
            details: None,
            kind: FailureKind::Validation,
        },
    }
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new().route("/run", post(run_job))
}
