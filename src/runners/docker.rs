use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::process::supervise;
use super::{Runner, TerminateSignal};
use crate::error::RunnerError;
use crate::events::SessionId;

/// Runs the app in a container through the `docker` CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDocker {
    /// Container name prefix; the session id is appended per run
    pub name: String,
    pub image: String,
    /// `-p` publish specs, e.g. `8080:80/tcp`
    #[serde(default)]
    pub ports: Vec<String>,
    /// `-v` bind mounts, e.g. `/dev/input:/dev/input:ro`
    #[serde(default)]
    pub mounts: Vec<String>,
    /// `-e` environment, e.g. `DISPLAY=:0`
    #[serde(default)]
    pub env: Vec<String>,
    /// `--device` host devices, e.g. `/dev/dri`
    #[serde(default)]
    pub devices: Vec<String>,
}

impl RunDocker {
    /// Build from an app's `[apps.runner]` table (`type = "docker"`)
    pub fn from_toml(table: &toml::Table) -> Result<Self, toml::de::Error> {
        let mut table = table.clone();
        table.remove("type");
        toml::Value::Table(table).try_into()
    }

    pub fn container_name(&self, session_id: SessionId) -> String {
        format!("{}_{}", self.name, session_id)
    }

    /// Arguments passed to `docker` to start the container for a session
    pub fn run_args(&self, session_id: SessionId) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            self.container_name(session_id),
        ];
        for port in &self.ports {
            args.extend(["-p".to_string(), port.clone()]);
        }
        for mount in &self.mounts {
            args.extend(["-v".to_string(), mount.clone()]);
        }
        for env in &self.env {
            args.extend(["-e".to_string(), env.clone()]);
        }
        for device in &self.devices {
            args.extend(["--device".to_string(), device.clone()]);
        }
        args.push(self.image.clone());
        args
    }
}

#[async_trait]
impl Runner for RunDocker {
    async fn run_until(&self, terminate: TerminateSignal) -> Result<(), RunnerError> {
        let session_id = terminate.session_id();
        let mut cmd = Command::new("docker");
        cmd.args(self.run_args(session_id));

        // Killing the CLI client leaves the container running.
        let mut stop = Command::new("docker");
        stop.arg("stop").arg(self.container_name(session_id));

        let label = format!("docker {}", self.image);
        supervise(cmd, &label, Some(stop), &terminate).await
    }

    fn serialize(&self) -> toml::Table {
        let mut table = toml::Table::new();
        table.insert("type".to_string(), "docker".into());
        if let Ok(toml::Value::Table(fields)) = toml::Value::try_from(self) {
            table.extend(fields);
        }
        table
    }
}
