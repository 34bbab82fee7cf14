use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

use super::{Runner, TerminateSignal};
use crate::error::RunnerError;

/// Command run when an app does not configure one
pub const DEFAULT_RUN_CMD: &str = "sh -c \"while :; do echo 'running...'; sleep 1; done\"";

/// Runs the app as a plain child process of the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunProcess {
    run_cmd: String,
}

impl RunProcess {
    pub fn new(run_cmd: impl Into<String>) -> Self {
        Self {
            run_cmd: run_cmd.into(),
        }
    }

    pub fn run_cmd(&self) -> &str {
        &self.run_cmd
    }
}

impl Default for RunProcess {
    fn default() -> Self {
        Self::new(DEFAULT_RUN_CMD)
    }
}

#[async_trait]
impl Runner for RunProcess {
    async fn run_until(&self, terminate: TerminateSignal) -> Result<(), RunnerError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&self.run_cmd);
        supervise(cmd, &self.run_cmd, None, &terminate).await
    }

    fn serialize(&self) -> toml::Table {
        let mut table = toml::Table::new();
        table.insert("type".to_string(), "process".into());
        table.insert("run_cmd".to_string(), self.run_cmd.clone().into());
        table
    }
}

/// Run `cmd` until it exits or `terminate` fires
///
/// On termination `stop_cmd` (if any) runs first so the workload can shut
/// down cleanly, then the child is killed. A terminate that fired before the
/// child was spawned stops it right away.
pub(crate) async fn supervise(
    mut cmd: Command,
    label: &str,
    stop_cmd: Option<Command>,
    terminate: &TerminateSignal,
) -> Result<(), RunnerError> {
    let session_id = terminate.session_id();
    cmd.stdin(Stdio::null()).kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
        command: label.to_string(),
        source,
    })?;

    info!(
        session_id,
        pid = child.id().unwrap_or(0),
        "Runner started: {}",
        label
    );

    let result = tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(RunnerError::Exited(status)),
            Err(e) => Err(RunnerError::Wait(e)),
        },
        _ = terminate.terminated() => {
            info!(session_id, "Stopping runner: {}", label);
            if let Some(mut stop_cmd) = stop_cmd {
                match stop_cmd.stdin(Stdio::null()).status().await {
                    Ok(status) if !status.success() => warn!(session_id, "Stop command exited with {}", status),
                    Err(e) => warn!(session_id, "Failed to run stop command: {}", e),
                    Ok(_) => {}
                }
            }
            if let Err(e) = child.kill().await {
                warn!(session_id, "Failed to kill runner: {}", e);
            }
            Ok(())
        }
    };

    info!(session_id, "Runner ended: {}", label);
    result
}
