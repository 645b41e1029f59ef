//! Execution engine submission client
//!
//! Sends one compiled graph to `POST <engine>/queue/job` and classifies the
//! outcome. Exactly one attempt is made per call: a retry after a lost
//! response could queue the same job twice, so callers that want retries
//! must add them knowingly.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use talkgen_common::config::EngineConfig;
use thiserror::Error;

use crate::graph::{Graph, Node, NodeId};

/// Path of the job submission endpoint, relative to the engine base URL
pub const SUBMIT_PATH: &str = "/queue/job";

const USER_AGENT: &str = concat!("talkgen-worker/", env!("CARGO_PKG_VERSION"));

/// Submission errors
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Engine unreachable (connection refused, timeout, ...)
    #[error("Engine transport error: {0}")]
    Transport(String),

    /// Engine answered with a non-success status
    #[error("Engine API error: {status}")]
    Engine { status: u16, body: String },

    /// Engine answered 200 but the body is unusable
    #[error("Invalid engine response: {reason}")]
    InvalidResponse { reason: String, body: String },

    /// HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),
}

impl SubmissionError {
    /// Raw engine body, when the engine produced one
    pub fn body(&self) -> Option<&str> {
        match self {
            SubmissionError::Engine { body, .. } | SubmissionError::InvalidResponse { body, .. } => {
                Some(body)
            }
            SubmissionError::Transport(_) | SubmissionError::ClientSetup(_) => None,
        }
    }
}

/// Accepted job
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResult {
    pub job_id: String,
    /// Parsed engine response body, returned to the caller untouched
    pub raw_body: Value,
}

#[derive(Serialize)]
struct SubmitBody<'a> {
    client_id: &'a str,
    graph: &'a BTreeMap<NodeId, Node>,
}

/// Engine job submission client
pub struct SubmissionClient {
    http_client: reqwest::Client,
    submit_url: String,
}

impl SubmissionClient {
    pub fn new(config: &EngineConfig) -> Result<Self, SubmissionError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| SubmissionError::ClientSetup(e.to_string()))?;

        Ok(Self {
            http_client,
            submit_url: format!("{}{}", config.base_url, SUBMIT_PATH),
        })
    }

    pub fn submit_url(&self) -> &str {
        &self.submit_url
    }

    /// Submit a graph, single attempt
    pub async fn submit(&self, graph: &Graph) -> Result<SubmissionResult, SubmissionError> {
        let body = SubmitBody {
            client_id: graph.client_id(),
            graph: graph.nodes(),
        };

        tracing::debug!(url = %self.submit_url, nodes = graph.len(), "Submitting graph to engine");

        // `.json()` also sets Content-Type: application/json
        let response = self
            .http_client
            .post(&self.submit_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;

        if status != reqwest::StatusCode::OK {
            tracing::warn!(status = status.as_u16(), "Engine rejected submission");
            return Err(SubmissionError::Engine {
                status: status.as_u16(),
                body: text,
            });
        }

        let raw_body: Value = serde_json::from_str(&text).map_err(|e| {
            SubmissionError::InvalidResponse {
                reason: format!("body is not JSON: {}", e),
                body: text.clone(),
            }
        })?;

        let job_id = extract_job_id(&raw_body).ok_or_else(|| SubmissionError::InvalidResponse {
            reason: "no job identifier in response".to_string(),
            body: text.clone(),
        })?;

        tracing::info!(job_id = %job_id, "Engine accepted job");

        Ok(SubmissionResult { job_id, raw_body })
    }
}

/// Job id from an engine response: `prompt_id`, else `job_id`
///
/// Numeric ids are accepted and rendered as strings.
pub fn extract_job_id(body: &Value) -> Option<String> {
    ["prompt_id", "job_id"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}
