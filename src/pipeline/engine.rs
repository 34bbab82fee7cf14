use crate::error::PipelineError;
use std::sync::Arc;

/// Execution states a pipeline is stepped through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Null,
    Ready,
    Paused,
    Playing,
}

/// Diagnostic message posted on a pipeline's bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    /// An element failed; the pipeline cannot continue
    Error {
        source: Option<String>,
        message: String,
        debug: Option<String>,
    },
    /// All sources drained
    EndOfStream,
}

/// Events that can be injected into a running element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// Custom upstream `GstForceKeyUnit` event asking the encoder for an
    /// immediate keyframe
    ForceKeyUnit { all_headers: bool },
}

/// Callback receiving every diagnostic message of one pipeline
///
/// Invoked from whatever thread the engine posts messages on.
pub type MessageWatch = Box<dyn Fn(BusMessage) + Send + Sync>;

/// A media engine able to build pipelines from a textual description
pub trait MediaEngine: Send + Sync {
    /// Engine name for logging
    fn name(&self) -> &str;

    /// Parse `description` into a pipeline in the `Null` state
    fn launch(&self, description: &str) -> Result<Arc<dyn MediaPipeline>, PipelineError>;

    /// Whether the named plugin is installed and usable
    fn is_plugin_available(&self, plugin_name: &str) -> bool;
}

/// A parsed, executable pipeline
///
/// Handles are shared between the runner thread and bus handlers running on
/// the publishing thread, so implementations must be thread safe.
pub trait MediaPipeline: Send + Sync {
    fn set_state(&self, state: PipelineState) -> Result<(), PipelineError>;

    /// Attach the diagnostic message watch; replaces any previous watch
    fn add_watch(&self, watch: MessageWatch) -> Result<(), PipelineError>;

    fn remove_watch(&self);

    /// Look up a sub-element by its `name=` property
    fn element(&self, name: &str) -> Option<Box<dyn PipelineElement>>;
}

/// Narrow handle to one element inside a running pipeline
pub trait PipelineElement: Send {
    fn name(&self) -> &str;

    /// Returns whether the element accepted the event
    fn send_event(&self, event: UpstreamEvent) -> bool;
}
