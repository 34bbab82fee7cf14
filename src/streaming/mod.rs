//! Session orchestration
//!
//! Binds a client session to its media pipeline: renders the app's
//! template with the session's parameters, runs it, and keeps the
//! session's control and terminate signals wired to the running pipeline
//! until it stops.

pub mod audio;
pub mod video;

pub use audio::{audio_template_args, start_streaming_audio};
pub use video::{start_streaming_video, video_template_args};

use std::sync::Arc;
use tracing::debug;

use crate::events::{EventBus, HandlerRegistration, SessionId, TerminateEvent};
use crate::pipeline::MainLoop;

/// Quit `main_loop` when `session_id` is terminated
fn on_terminate(
    bus: &EventBus,
    session_id: SessionId,
    main_loop: Arc<MainLoop>,
    kind: &'static str,
) -> HandlerRegistration {
    bus.register_handler(move |event: &TerminateEvent| {
        if event.session_id == session_id {
            debug!(session_id, "Terminating {} pipeline", kind);
            main_loop.quit();
        }
    })
}
