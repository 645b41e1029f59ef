//! Generation request handler
//!
//! Runs resolve → build → submit for one request and turns every outcome,
//! good or bad, into a [`HandlerResponse`]. Nothing escapes as an error or
//! panic, so one bad request never takes the worker down.

use serde::Serialize;
use serde_json::Value;
use talkgen_common::config::{EngineConfig, RequestDefaults};
use thiserror::Error;

use crate::graph::{build_graph, Graph, GraphIntegrityError, TemplateSettings};
use crate::params::{self, ValidationError};
use crate::submission::{SubmissionClient, SubmissionError, SubmissionResult};

/// Request path failures
#[derive(Debug, Error)]
pub enum JobError {
    #[error("No input provided")]
    NoInput,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Graph integrity error: {0}")]
    GraphIntegrity(#[from] GraphIntegrityError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

/// Failure category, used by the HTTP layer to pick a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NoInput,
    Validation,
    GraphIntegrity,
    Transport,
    Engine,
    InvalidResponse,
    Internal,
}

/// Structured response returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HandlerResponse {
    Success {
        job_id: String,
        status: String,
        output: Value,
    },
    Failure {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
        #[serde(skip)]
        kind: FailureKind,
    },
}

impl HandlerResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, HandlerResponse::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            HandlerResponse::Success { .. } => None,
            HandlerResponse::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<SubmissionResult> for HandlerResponse {
    fn from(result: SubmissionResult) -> Self {
        HandlerResponse::Success {
            job_id: result.job_id,
            status: "success".to_string(),
            output: result.raw_body,
        }
    }
}

impl From<JobError> for HandlerResponse {
    fn from(err: JobError) -> Self {
        let kind = match &err {
            JobError::NoInput => FailureKind::NoInput,
            JobError::Validation(_) => FailureKind::Validation,
            JobError::GraphIntegrity(_) => FailureKind::GraphIntegrity,
            JobError::Submission(SubmissionError::Transport(_)) => FailureKind::Transport,
            JobError::Submission(SubmissionError::Engine { .. }) => FailureKind::Engine,
            JobError::Submission(SubmissionError::InvalidResponse { .. }) => {
                FailureKind::InvalidResponse
            }
            JobError::Submission(SubmissionError::ClientSetup(_)) => FailureKind::Internal,
        };
        let details = match &err {
            JobError::Submission(submission) => submission.body().map(str::to_string),
            _ => None,
        };

        HandlerResponse::Failure {
            error: err.to_string(),
            details,
            kind,
        }
    }
}

/// Compiles and submits generation requests
///
/// Holds only read-only state, so one instance serves concurrent requests.
pub struct JobHandler {
    defaults: RequestDefaults,
    template: TemplateSettings,
    client_id: String,
    client: SubmissionClient,
}

impl JobHandler {
    pub fn new(
        engine: &EngineConfig,
        defaults: RequestDefaults,
        template: TemplateSettings,
    ) -> Result<Self, SubmissionError> {
        Ok(Self {
            defaults,
            template,
            client_id: engine.client_id.clone(),
            client: SubmissionClient::new(engine)?,
        })
    }

    /// Resolve and build without touching the network
    pub fn compile(&self, input: &Value) -> Result<Graph, JobError> {
        let params = params::resolve(input, &self.defaults)?;
        Ok(build_graph(&params, &self.template, &self.client_id)?)
    }

    /// Handle one request `input` object
    pub async fn handle(&self, input: &Value) -> HandlerResponse {
        match self.run(input).await {
            Ok(result) => result.into(),
            Err(err) => {
                tracing::warn!(error = %err, "Generation request failed");
                err.into()
            }
        }
    }

    /// Handle a request envelope `{ "input": {...} }`
    pub async fn handle_event(&self, event: &Value) -> HandlerResponse {
        match event.get("input") {
            Some(input) if !is_empty_input(input) => self.handle(input).await,
            _ => {
                tracing::warn!("Request envelope without input");
                JobError::NoInput.into()
            }
        }
    }

    async fn run(&self, input: &Value) -> Result<SubmissionResult, JobError> {
        let graph = self.compile(input)?;
        Ok(self.client.submit(&graph).await?)
    }
}

fn is_empty_input(input: &Value) -> bool {
    match input {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64() == Some(0.0),
    }
}
