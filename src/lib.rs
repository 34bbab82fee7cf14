pub mod error;
pub mod events;
pub mod host;
pub mod http;
pub mod pipeline;
pub mod runners;
pub mod settings;
pub mod state;
pub mod streaming;

pub use error::{ConfigError, PipelineError, RunnerError, StreamingError, TemplateError};
pub use events::{
    ControlEvent, ControlEventType, EventBus, HandlerRegistration, LaunchAppEvent, SessionId,
    TerminateEvent,
};
pub use host::{ActiveSession, ActiveSessions, Host, SessionKind};
pub use http::{create_router, AppState};
pub use pipeline::{init_engine, run_pipeline, EngineKind, MediaEngine, RunOutcome};
pub use runners::Runner;
pub use settings::Settings;
pub use state::{App, AudioSession, Config, PairedClient, VideoSession};
pub use streaming::{start_streaming_audio, start_streaming_video};
