use serde::{Deserialize, Serialize};

use super::encoders::GstEncoder;

/// `[gstreamer.video]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GstVideoCfg {
    pub default_source: String,
    pub default_sink: String,
    /// Ordered by preference
    pub hevc_encoders: Vec<GstEncoder>,
    /// Ordered by preference
    pub h264_encoders: Vec<GstEncoder>,
}

/// `[gstreamer.audio]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GstAudioCfg {
    pub default_source: String,
    pub default_audio_params: String,
    pub default_opus_encoder: String,
    pub default_sink: String,
}

/// `[apps.video]` per-app overrides; unset keys fall back to the defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoOverrides {
    pub source: Option<String>,
    pub video_params: Option<String>,
    pub h264_encoder: Option<String>,
    pub hevc_encoder: Option<String>,
    pub sink: Option<String>,
}

/// `[apps.audio]` per-app overrides; unset keys fall back to the defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioOverrides {
    pub source: Option<String>,
    pub audio_params: Option<String>,
    pub opus_encoder: Option<String>,
    pub sink: Option<String>,
}

/// Unrendered pipeline templates of one app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPipelines {
    pub h264: String,
    pub hevc: String,
    pub opus: String,
}

fn link(segments: [&str; 4]) -> String {
    segments.join(" ! ")
}

fn video_pipeline(
    overrides: &VideoOverrides,
    encoder_override: Option<&String>,
    defaults: &GstVideoCfg,
    encoder: &GstEncoder,
) -> String {
    link([
        overrides.source.as_deref().unwrap_or(&defaults.default_source),
        overrides.video_params.as_deref().unwrap_or(&encoder.video_params),
        encoder_override.map(String::as_str).unwrap_or(&encoder.encoder_pipeline),
        overrides.sink.as_deref().unwrap_or(&defaults.default_sink),
    ])
}

/// Assemble `source ! params ! encoder ! sink` for each session type
///
/// Each segment comes from the app override when present, else from the
/// family default (the selected encoder supplies params and encoder).
pub fn resolve_app_pipelines(
    video: &VideoOverrides,
    audio: &AudioOverrides,
    video_defaults: &GstVideoCfg,
    audio_defaults: &GstAudioCfg,
    h264_encoder: &GstEncoder,
    hevc_encoder: &GstEncoder,
) -> AppPipelines {
    AppPipelines {
        h264: video_pipeline(video, video.h264_encoder.as_ref(), video_defaults, h264_encoder),
        hevc: video_pipeline(video, video.hevc_encoder.as_ref(), video_defaults, hevc_encoder),
        opus: link([
            audio.source.as_deref().unwrap_or(&audio_defaults.default_source),
            audio.audio_params.as_deref().unwrap_or(&audio_defaults.default_audio_params),
            audio.opus_encoder.as_deref().unwrap_or(&audio_defaults.default_opus_encoder),
            audio.sink.as_deref().unwrap_or(&audio_defaults.default_sink),
        ]),
    }
}
