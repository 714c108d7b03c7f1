// Deployment runner: executes the external deploy command out-of-band

use crate::config::DeployConfig;
use crate::models::{DeployStatus, DeploymentRun};
use crate::registry::ServiceRegistry;
use chrono::Utc;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::{Duration, timeout};

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// A run is already in flight; the new trigger is rejected, never
    /// queued or run concurrently.
    #[error("deployment already in progress")]
    AlreadyInProgress,
}

struct RunnerState {
    in_flight: bool,
    last_run: Option<DeploymentRun>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

/// Runs the configured deploy command, at most one run at a time.
/// `trigger` only spawns; the caller never waits on the command itself.
pub struct DeploymentRunner {
    config: DeployConfig,
    registry: Arc<ServiceRegistry>,
    state: Arc<Mutex<RunnerState>>,
}

struct RunOutcome {
    status: DeployStatus,
    exit_code: Option<i32>,
    stderr_excerpt: Option<String>,
}

impl DeploymentRunner {
    pub fn new(config: DeployConfig, registry: Arc<ServiceRegistry>) -> Self {
        Self {
            config,
            registry,
            state: Arc::new(Mutex::new(RunnerState {
                in_flight: false,
                last_run: None,
                handle: None,
            })),
        }
    }

    /// Accept a trigger and start the command on a detached task, or
    /// reject it if a run is already in flight. The original run is
    /// unaffected by a rejection.
    pub async fn trigger(&self) -> Result<(), DeployError> {
        let mut state = self.state.lock().await;
        if state.in_flight {
            return Err(DeployError::AlreadyInProgress);
        }
        state.in_flight = true;
        state.last_run = Some(DeploymentRun {
            triggered_at: Utc::now(),
            command: self.config.command.clone(),
            status: DeployStatus::Running,
            exit_code: None,
            stderr_excerpt: None,
            completed_at: None,
        });
        self.registry.mark_deploying().await;

        let config = self.config.clone();
        let registry = self.registry.clone();
        let shared = self.state.clone();
        tracing::info!(command = %config.command, "deployment triggered");
        state.handle = Some(tokio::spawn(async move {
            run_and_record(config, registry, shared).await;
        }));
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.in_flight
    }

    /// Most recent run record (live or terminal), if any run was ever
    /// triggered.
    pub async fn last_run(&self) -> Option<DeploymentRun> {
        self.state.lock().await.last_run.clone()
    }

    /// In-flight flag plus the last run's status, read under one lock.
    pub async fn run_state(&self) -> (bool, Option<DeployStatus>) {
        let state = self.state.lock().await;
        (state.in_flight, state.last_run.as_ref().map(|r| r.status))
    }

    /// Wait for the current run (if any) to reach a terminal state.
    /// Used by tests and graceful shutdown; the request path never calls
    /// this.
    pub async fn wait_idle(&self) {
        let handle = { self.state.lock().await.handle.take() };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn run_and_record(
    config: DeployConfig,
    registry: Arc<ServiceRegistry>,
    state: Arc<Mutex<RunnerState>>,
) {
    let outcome = execute(&config).await;
    let completed_at = Utc::now();
    let success = outcome.status == DeployStatus::Succeeded;

    registry.complete_deploy(success, completed_at).await;

    let mut state = state.lock().await;
    state.in_flight = false;
    if let Some(run) = state.last_run.as_mut() {
        run.status = outcome.status;
        run.exit_code = outcome.exit_code;
        run.stderr_excerpt = outcome.stderr_excerpt.clone();
        run.completed_at = Some(completed_at);
    }
    drop(state);

    if success {
        tracing::info!(operation = "deploy", "deployment succeeded");
    } else {
        tracing::warn!(
            operation = "deploy",
            exit_code = ?outcome.exit_code,
            stderr = ?outcome.stderr_excerpt,
            "deployment failed"
        );
    }
}

/// Spawn `/bin/sh -c <command>` with piped output, wait bounded by the
/// configured timeout, and map the exit to a terminal run outcome.
async fn execute(config: &DeployConfig) -> RunOutcome {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(&config.command);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return RunOutcome {
                status: DeployStatus::Failed,
                exit_code: None,
                stderr_excerpt: Some(format!("spawn failed: {e}")),
            };
        }
    };

    let stdout_task = child.stdout.take().map(|out| tokio::spawn(log_stdout(out)));
    let stderr_task = child
        .stderr
        .take()
        .map(|err| tokio::spawn(drain_stderr(err, config.stderr_excerpt_max)));

    let waited = timeout(Duration::from_secs(config.timeout_secs), child.wait()).await;

    let status = match waited {
        Err(_) => {
            // Unresponsive deploy script: kill it so future triggers are
            // not blocked forever.
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "failed to kill timed-out deployment");
            }
            let _ = child.wait().await;
            join_output(stdout_task, stderr_task).await;
            return RunOutcome {
                status: DeployStatus::Failed,
                exit_code: None,
                stderr_excerpt: Some(format!("timed out after {}s", config.timeout_secs)),
            };
        }
        Ok(Err(e)) => {
            join_output(stdout_task, stderr_task).await;
            return RunOutcome {
                status: DeployStatus::Failed,
                exit_code: None,
                stderr_excerpt: Some(format!("wait failed: {e}")),
            };
        }
        Ok(Ok(status)) => status,
    };

    let captured = join_output(stdout_task, stderr_task).await;
    if status.success() {
        RunOutcome {
            status: DeployStatus::Succeeded,
            exit_code: status.code(),
            stderr_excerpt: None,
        }
    } else {
        let excerpt = if captured.is_empty() {
            format!("exited with {status}")
        } else {
            captured
        };
        RunOutcome {
            status: DeployStatus::Failed,
            exit_code: status.code(),
            stderr_excerpt: Some(excerpt),
        }
    }
}

async fn join_output(
    stdout_task: Option<tokio::task::JoinHandle<()>>,
    stderr_task: Option<tokio::task::JoinHandle<String>>,
) -> String {
    if let Some(task) = stdout_task {
        let _ = task.await;
    }
    match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    }
}

async fn log_stdout(stream: impl AsyncRead + Unpin) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(operation = "deploy", "stdout: {}", line);
    }
}

/// Log stderr line-wise and keep a bounded excerpt for the run record.
async fn drain_stderr(stream: impl AsyncRead + Unpin, max_bytes: usize) -> String {
    let mut lines = BufReader::new(stream).lines();
    let mut captured = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::warn!(operation = "deploy", "stderr: {}", line);
        if captured.len() < max_bytes {
            if !captured.is_empty() {
                captured.push('\n');
            }
            let room = max_bytes - captured.len();
            if line.len() > room {
                let mut cut = room;
                while !line.is_char_boundary(cut) {
                    cut -= 1;
                }
                captured.push_str(&line[..cut]);
            } else {
                captured.push_str(&line);
            }
        }
    }
    captured
}
