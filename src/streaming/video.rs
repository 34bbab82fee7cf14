use std::sync::Arc;
use tracing::{debug, info, warn};

use super::on_terminate;
use crate::error::StreamingError;
use crate::events::{ControlEvent, ControlEventType};
use crate::pipeline::{run_pipeline, template, MediaEngine, RunOutcome, UpstreamEvent};
use crate::state::VideoSession;

/// Element of every video pipeline that receives forced keyframe requests
pub const PAYLOADER_NAME: &str = "moonlight_pay";

/// Placeholder values a video template is rendered with
pub fn video_template_args(session: &VideoSession, client_port: u16) -> Vec<(&'static str, String)> {
    vec![
        ("width", session.display_mode.width.to_string()),
        ("height", session.display_mode.height.to_string()),
        ("fps", session.display_mode.refresh_rate.to_string()),
        ("bitrate", session.bitrate_kbps.to_string()),
        ("client_port", client_port.to_string()),
        ("client_ip", session.client_ip.clone()),
        ("payload_size", session.packet_size.to_string()),
        ("fec_percentage", session.fec_percentage.to_string()),
        ("min_required_fec_packets", session.min_required_fec_packets.to_string()),
        ("slices_per_frame", session.slices_per_frame.to_string()),
        ("color_space", session.color_space.as_gst_str().to_string()),
        ("color_range", session.color_range.as_gst_str().to_string()),
    ]
}

/// Stream video for `session` to `client_port`
///
/// Blocks the calling thread until the pipeline errors, ends, or the
/// session is terminated. While it runs, `IdrFrame` control events for this
/// session force the encoder to emit a keyframe.
pub fn start_streaming_video(
    session: &VideoSession,
    client_port: u16,
    engine: &dyn MediaEngine,
) -> Result<RunOutcome, StreamingError> {
    let description = template::render(&session.gst_pipeline, &video_template_args(session, client_port))?;
    let session_id = session.session_id;
    let bus = &session.event_bus;

    info!(session_id, "Starting video pipeline: {}", description);

    let outcome = run_pipeline(engine, &description, |pipeline, main_loop| {
        let keyframes = {
            let pipeline = Arc::clone(&pipeline);
            bus.register_handler(move |event: &ControlEvent| {
                if event.session_id != session_id || event.event_type != ControlEventType::IdrFrame {
                    return;
                }
                debug!(session_id, "Forcing IDR");
                match pipeline.element(PAYLOADER_NAME) {
                    Some(element) => {
                        let accepted = element.send_event(UpstreamEvent::ForceKeyUnit { all_headers: true });
                        if !accepted {
                            warn!(session_id, "{} rejected the keyframe request", element.name());
                        }
                    }
                    None => warn!(session_id, "No {} element, unable to force IDR", PAYLOADER_NAME),
                }
            })
        };

        let terminate = on_terminate(bus, session_id, main_loop, "video");

        vec![keyframes, terminate]
    })?;

    info!(session_id, "Video pipeline finished: {:?}", outcome);
    Ok(outcome)
}
