use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::pipeline::EngineKind;

/// Process settings of the host binary
///
/// Separate from the streaming config (`state::Config`), which the host
/// itself rewrites while running.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Location of the streaming config TOML; created on first run
    pub config_path: PathBuf,
    pub http: HttpSettings,
    pub logging: LoggingSettings,
    pub engine: EngineKind,
}

#[derive(Debug, Deserialize)]
pub struct HttpSettings {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSettings {
    /// `tracing` filter directive, `RUST_LOG` takes precedence
    pub filter: String,
}

impl Settings {
    /// Defaults, then the optional settings file, then `GSHOST__*` variables
    /// (e.g. `GSHOST__HTTP__PORT=8080`)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("config_path", "config.toml")?
            .set_default("http.bind", "127.0.0.1")?
            .set_default("http.port", 47990)?
            .set_default("logging.filter", "info")?
            .set_default("engine", "launch")?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("GSHOST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
