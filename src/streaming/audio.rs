use tracing::info;

use super::on_terminate;
use crate::error::StreamingError;
use crate::pipeline::{run_pipeline, template, MediaEngine, RunOutcome};
use crate::state::AudioSession;

/// Placeholder values an audio template is rendered with
pub fn audio_template_args(session: &AudioSession, client_port: u16) -> Vec<(&'static str, String)> {
    vec![
        ("channels", session.channels.to_string()),
        ("bitrate", session.bitrate.to_string()),
        ("packet_duration", session.packet_duration.to_string()),
        ("aes_key", session.aes_key.clone()),
        ("aes_iv", session.aes_iv.clone()),
        ("encrypt", session.encrypt_audio.to_string()),
        ("client_port", client_port.to_string()),
        ("client_ip", session.client_ip.clone()),
    ]
}

/// Stream audio for `session` to `client_port`
///
/// Blocks the calling thread until the pipeline errors, ends, or the
/// session is terminated.
pub fn start_streaming_audio(
    session: &AudioSession,
    client_port: u16,
    engine: &dyn MediaEngine,
) -> Result<RunOutcome, StreamingError> {
    let description = template::render(&session.gst_pipeline, &audio_template_args(session, client_port))?;
    let session_id = session.session_id;

    info!(session_id, "Starting audio pipeline");

    let outcome = run_pipeline(engine, &description, |_pipeline, main_loop| {
        vec![on_terminate(&session.event_bus, session_id, main_loop, "audio")]
    })?;

    info!(session_id, "Audio pipeline finished: {:?}", outcome);
    Ok(outcome)
}
