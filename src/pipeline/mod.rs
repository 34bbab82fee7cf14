//! Media pipeline execution
//!
//! - `engine`: the `MediaEngine`/`MediaPipeline` seam
//! - `launch`: engine driving `gst-launch-1.0` child processes
//! - `gst`: in-process GStreamer engine (feature `gstreamer`)
//! - `runner`: blocking run loop with guaranteed teardown
//! - `template`: `{placeholder}` rendering of pipeline descriptions

pub mod engine;
#[cfg(feature = "gstreamer")]
pub mod gst;
pub mod launch;
pub mod runner;
pub mod template;

pub use engine::{
    BusMessage, MediaEngine, MediaPipeline, MessageWatch, PipelineElement, PipelineState,
    UpstreamEvent,
};
#[cfg(feature = "gstreamer")]
pub use gst::GstEngine;
pub use launch::LaunchEngine;
pub use runner::{run_pipeline, MainLoop, RunOutcome};

use crate::error::PipelineError;
use std::sync::Arc;

/// Which media engine the host drives pipelines with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// `gst-launch-1.0` child processes
    #[default]
    Launch,
    /// Linked GStreamer (needs the `gstreamer` feature)
    Gstreamer,
}

/// Initialize the process-wide media engine
///
/// Must be called once before any config is loaded or pipeline built.
pub fn init_engine(kind: EngineKind) -> Result<Arc<dyn MediaEngine>, PipelineError> {
    match kind {
        EngineKind::Launch => Ok(Arc::new(LaunchEngine::new())),
        #[cfg(feature = "gstreamer")]
        EngineKind::Gstreamer => Ok(Arc::new(GstEngine::init()?)),
        #[cfg(not(feature = "gstreamer"))]
        EngineKind::Gstreamer => Err(PipelineError::EngineInit(
            "built without the `gstreamer` feature".to_string(),
        )),
    }
}
