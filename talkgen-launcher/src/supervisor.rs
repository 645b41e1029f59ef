//! Execution engine process supervisor
//!
//! Owns the single engine process for its whole life:
//!
//! ```text
//! Starting ──health 200──▶ Ready ──signal / stop──▶ Terminated
//!     │
//!     └──timeout / exit──▶ Failed
//! ```
//!
//! Shutdown requests arrive through a `CancellationToken` that the polling
//! and monitoring loops check at every iteration boundary. All exit paths go
//! through [`ProcessSupervisor::cleanup`], which is idempotent.

use std::process::Stdio;
use std::time::Duration;

use talkgen_common::config::LauncherConfig;
use talkgen_common::poll::{poll_until_ready, PollOutcome, PollPolicy, Probe};
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::output::forward_output;

/// Upper bound on a single health request
const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// How long the output forwarders may take to flush after the engine exits
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Supervisor errors
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Engine did not report healthy before the startup deadline
    #[error("Engine failed to become healthy within {} seconds", .0.as_secs())]
    StartupTimeout(Duration),

    /// Engine process could not be started
    #[error("Failed to spawn engine {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Engine process exited on its own
    #[error("Engine process exited unexpectedly: {0}")]
    EngineExited(String),

    /// Health polling failed in a way that is not "not ready yet"
    #[error("Health check failed: {0}")]
    HealthCheck(String),

    /// Shutdown was requested
    #[error("Shutdown requested")]
    Cancelled,

    #[error("Engine already running (pid {0:?})")]
    AlreadyRunning(Option<u32>),

    #[error("Engine not running")]
    NotRunning,

    /// Launcher settings cannot be used
    #[error("Invalid launcher configuration: {0}")]
    Config(String),

    /// HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),
}

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Starting,
    Ready,
    Failed,
    Terminated,
}

/// Handle to the spawned engine process
#[derive(Debug)]
pub struct EngineHandle {
    pid: Option<u32>,
    state: EngineState,
    child: Option<Child>,
    output_tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Whether the process is still owned (not yet reaped)
    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Kill the process and wait for it to exit
    ///
    /// Safe to call repeatedly: once the child is reaped there is nothing
    /// left to do. Never fails; problems are logged.
    pub async fn terminate(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                info!(pid = ?self.pid, %status, "Engine process already exited");
            }
            _ => {
                info!(pid = ?self.pid, "Stopping engine process");
                // kill() sends SIGKILL and waits for the exit status
                if let Err(e) = child.kill().await {
                    warn!(pid = ?self.pid, "Failed to kill engine process: {}", e);
                }
            }
        }

        // Pipes close once the process is gone; let the last lines through
        let mut tasks = std::mem::take(&mut self.output_tasks);
        let drained = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, async {
            for task in tasks.iter_mut() {
                let _ = task.await;
            }
        })
        .await;
        if drained.is_err() {
            debug!(pid = ?self.pid, "Engine output still open, abandoning forwarders");
            for task in &tasks {
                task.abort();
            }
        }

        if self.state != EngineState::Failed {
            self.state = EngineState::Terminated;
        }
    }
}

/// Terminate an engine handle if there is one
///
/// Accepts an absent handle so exit paths can call it unconditionally.
pub async fn cleanup(handle: Option<&mut EngineHandle>) {
    if let Some(handle) = handle {
        handle.terminate().await;
    }
}

/// Why startup polling stopped early
enum StartupAbort {
    Exited(String),
    Probe(String),
}

/// Spawns, health-checks and stops the execution engine
pub struct ProcessSupervisor {
    config: LauncherConfig,
    http_client: reqwest::Client,
    cancel: CancellationToken,
    handle: Option<EngineHandle>,
}

impl ProcessSupervisor {
    /// Create a supervisor; `cancel` is the shutdown signal
    pub fn new(config: LauncherConfig, cancel: CancellationToken) -> Result<Self, SupervisorError> {
        config
            .validate()
            .map_err(|e| SupervisorError::Config(e.to_string()))?;

        let http_client = reqwest::Client::builder()
            .timeout(HEALTH_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SupervisorError::ClientSetup(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
            cancel,
            handle: None,
        })
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn handle(&self) -> Option<&EngineHandle> {
        self.handle.as_ref()
    }

    /// Current engine state, `None` before the first spawn
    pub fn state(&self) -> Option<EngineState> {
        self.handle.as_ref().map(EngineHandle::state)
    }

    /// Launch the engine process; returns at once with the handle in `Starting`
    pub fn spawn(&mut self) -> Result<&EngineHandle, SupervisorError> {
        if let Some(handle) = self.handle.as_ref().filter(|h| h.is_running()) {
            return Err(SupervisorError::AlreadyRunning(handle.pid));
        }

        let args = self.config.engine_args();
        let mut command = Command::new(&self.config.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| SupervisorError::Spawn {
            program: self.config.program.display().to_string(),
            source,
        })?;

        let pid = child.id();
        let output_tasks = pid
            .map(|pid| forward_output(&mut child, pid))
            .unwrap_or_default();

        info!(
            pid = ?pid,
            program = %self.config.program.display(),
            args = ?args,
            "Engine process spawned"
        );

        Ok(&*self.handle.insert(EngineHandle {
            pid,
            state: EngineState::Starting,
            child: Some(child),
            output_tasks,
        }))
    }

    /// Poll the health endpoint until the engine is ready
    ///
    /// Connection failures count as "not ready yet". On timeout the process
    /// is killed, the state becomes `Failed` and `StartupTimeout` is
    /// returned. A shutdown request stops polling, cleans up and returns
    /// `Cancelled`.
    pub async fn wait_until_ready(&mut self) -> Result<&EngineHandle, SupervisorError> {
        let policy = PollPolicy::new(self.config.poll_interval(), self.config.startup_timeout());
        let health_url = self.config.health_url();
        let http_client = self.http_client.clone();

        let Some(child) = self.handle.as_mut().and_then(|h| h.child.as_mut()) else {
            return Err(SupervisorError::NotRunning);
        };

        info!(
            url = %health_url,
            interval_ms = policy.interval.as_millis() as u64,
            timeout_secs = policy.timeout.as_secs(),
            "Waiting for engine health check"
        );

        let outcome = poll_until_ready(policy, &self.cancel, |attempt| {
            let exited = match child.try_wait() {
                Ok(Some(status)) => Some(status.to_string()),
                Ok(None) => None,
                Err(e) => Some(format!("status unavailable: {}", e)),
            };
            let http_client = http_client.clone();
            let url = health_url.clone();
            async move {
                match exited {
                    Some(status) => Probe::Abort(StartupAbort::Exited(status)),
                    None => probe_health(&http_client, &url, attempt).await,
                }
            }
        })
        .await;

        match outcome {
            PollOutcome::Ready { attempts, elapsed } => {
                info!(attempts, elapsed_ms = elapsed.as_millis() as u64, "Engine is ready");
                let handle = self.handle.as_mut().ok_or(SupervisorError::NotRunning)?;
                handle.state = EngineState::Ready;
                Ok(&*handle)
            }
            PollOutcome::TimedOut { attempts, .. } => {
                error!(attempts, "Engine failed to become healthy in time");
                self.fail_and_cleanup().await;
                Err(SupervisorError::StartupTimeout(policy.timeout))
            }
            PollOutcome::Cancelled { attempts } => {
                info!(attempts, "Shutdown requested during engine startup");
                self.cleanup().await;
                Err(SupervisorError::Cancelled)
            }
            PollOutcome::Aborted { reason, .. } => {
                self.fail_and_cleanup().await;
                Err(match reason {
                    StartupAbort::Exited(status) => SupervisorError::EngineExited(status),
                    StartupAbort::Probe(msg) => SupervisorError::HealthCheck(msg),
                })
            }
        }
    }

    /// Spawn the engine and wait until it is healthy
    pub async fn start(&mut self) -> Result<&EngineHandle, SupervisorError> {
        self.spawn()?;
        self.wait_until_ready().await
    }

    /// Block until shutdown is requested or the engine dies
    ///
    /// Returns `Ok(())` after a requested shutdown (engine stopped), and
    /// `EngineExited` when the engine exits by itself.
    pub async fn monitor(&mut self) -> Result<(), SupervisorError> {
        let exit = {
            let Some(child) = self.handle.as_mut().and_then(|h| h.child.as_mut()) else {
                return Err(SupervisorError::NotRunning);
            };
            tokio::select! {
                _ = self.cancel.cancelled() => None,
                status = child.wait() => Some(status),
            }
        };

        match exit {
            None => {
                info!("Shutdown requested, stopping engine");
                self.cleanup().await;
                Ok(())
            }
            Some(status) => {
                let status = match status {
                    Ok(status) => status.to_string(),
                    Err(e) => format!("status unavailable: {}", e),
                };
                error!(%status, "Engine process exited unexpectedly");
                self.fail_and_cleanup().await;
                Err(SupervisorError::EngineExited(status))
            }
        }
    }

    /// Stop the engine if it is running
    ///
    /// Idempotent: safe before `spawn`, after a previous cleanup, and after
    /// the engine has already exited.
    pub async fn cleanup(&mut self) {
        cleanup(self.handle.as_mut()).await;
    }

    async fn fail_and_cleanup(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.state = EngineState::Failed;
        }
        self.cleanup().await;
    }
}

/// One health check request
async fn probe_health(
    http_client: &reqwest::Client,
    url: &str,
    attempt: u32,
) -> Probe<StartupAbort> {
    match http_client.get(url).send().await {
        Ok(response) if response.status() == reqwest::StatusCode::OK => Probe::Ready,
        Ok(response) => {
            debug!(attempt, status = response.status().as_u16(), "Engine not healthy yet");
            Probe::NotReady
        }
        Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
            debug!(attempt, "Engine not reachable yet: {}", e);
            Probe::NotReady
        }
        Err(e) => Probe::Abort(StartupAbort::Probe(e.to_string())),
    }
}
