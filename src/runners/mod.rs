//! App runners
//!
//! A runner is the narrow start/stop contract the host has with whatever
//! actually executes an app: `run_until` starts the workload for a session
//! and returns once it exits or the session's `TerminateSignal` fires.

pub mod docker;
pub mod process;

pub use docker::RunDocker;
pub use process::{RunProcess, DEFAULT_RUN_CMD};

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

use crate::error::RunnerError;
use crate::events::{EventBus, HandlerRegistration, SessionId, TerminateEvent};

/// Armed subscription to one session's `TerminateEvent`
///
/// A terminate published after `subscribe` returns is kept until the runner
/// waits for it, even if the runner has not started yet. Dropping the signal
/// unregisters it.
pub struct TerminateSignal {
    session_id: SessionId,
    notify: Arc<Notify>,
    _registration: HandlerRegistration,
}

impl TerminateSignal {
    pub fn subscribe(session_id: SessionId, event_bus: &EventBus) -> Self {
        let notify = Arc::new(Notify::new());
        let registration = {
            let notify = Arc::clone(&notify);
            event_bus.register_handler(move |ev: &TerminateEvent| {
                if ev.session_id == session_id {
                    notify.notify_one();
                }
            })
        };
        Self {
            session_id,
            notify,
            _registration: registration,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Resolves once the session is terminated
    pub async fn terminated(&self) {
        self.notify.notified().await;
    }
}

impl Debug for TerminateSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminateSignal")
            .field("session_id", &self.session_id)
            .finish()
    }
}

#[async_trait]
pub trait Runner: Send + Sync + Debug {
    /// Run the app until it exits or `terminate` fires
    async fn run_until(&self, terminate: TerminateSignal) -> Result<(), RunnerError>;

    /// Run the app for `session_id` until it exits or a matching
    /// `TerminateEvent` is published on `event_bus`
    async fn run(&self, session_id: SessionId, event_bus: &EventBus) -> Result<(), RunnerError> {
        self.run_until(TerminateSignal::subscribe(session_id, event_bus))
            .await
    }

    /// Runner-specific part of the exported app record
    fn serialize(&self) -> toml::Table;
}

/// Build the runner described by an app's optional `runner` table
///
/// Missing tables and missing `type` mean `process`. Unknown types and
/// invalid docker tables are logged and replaced by the default process
/// runner; a bad runner never prevents the config from loading.
pub fn from_toml(runner: Option<&toml::Table>) -> Arc<dyn Runner> {
    let Some(table) = runner else {
        return Arc::new(RunProcess::default());
    };

    match table.get("type").and_then(toml::Value::as_str).unwrap_or("process") {
        "process" => {
            let run_cmd = table
                .get("run_cmd")
                .and_then(toml::Value::as_str)
                .unwrap_or(DEFAULT_RUN_CMD);
            Arc::new(RunProcess::new(run_cmd))
        }
        "docker" => match RunDocker::from_toml(table) {
            Ok(docker) => Arc::new(docker),
            Err(e) => {
                warn!("[TOML] Invalid docker runner, falling back to process: {}", e);
                Arc::new(RunProcess::default())
            }
        },
        other => {
            warn!(
                "[TOML] Found runner of type: {}, valid types are: 'process' or 'docker'",
                other
            );
            Arc::new(RunProcess::default())
        }
    }
}
