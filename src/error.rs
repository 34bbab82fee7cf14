//! Error types for each concern of the host.
//!
//! The binary and the glue code use `anyhow`; these enums are what the
//! library surfaces so callers can tell a fatal startup failure apart from a
//! failure that only affects one session.

use std::path::PathBuf;

use crate::state::CodecFamily;

/// Loading, migrating or persisting the host configuration failed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config document: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config document: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("config key `{0}` has an unexpected type")]
    InvalidKey(&'static str),

    #[error(
        "Unable to find a compatible {family} encoder, please check [[gstreamer.video.{key}]] \
         in your config.toml or your GStreamer installation",
        key = .family.catalog_key()
    )]
    NoCompatibleEncoder { family: CodecFamily },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A media pipeline could not be built or driven.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to parse pipeline description: {0}")]
    Parse(String),

    #[error("failed to set pipeline state to {state:?}: {reason}")]
    StateChange {
        state: crate::pipeline::PipelineState,
        reason: String,
    },

    #[error("media engine initialization failed: {0}")]
    EngineInit(String),

    #[error("media engine error: {0}")]
    Engine(String),
}

/// A pipeline template could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unknown placeholder `{{{0}}}` in pipeline template")]
    UnknownPlaceholder(String),

    #[error("unterminated placeholder starting at byte {0}")]
    Unterminated(usize),

    #[error("unmatched `}}` at byte {0}")]
    UnmatchedBrace(usize),
}

/// A streaming session could not be started.
#[derive(Debug, thiserror::Error)]
pub enum StreamingError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// An app runner failed to start or supervise its workload.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for runner process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("runner process exited with {0}")]
    Exited(std::process::ExitStatus),
}
