use std::sync::Arc;
use std::time::Duration;

use crate::events::{EventBus, SessionId};

/// Resolution and refresh rate negotiated with the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub refresh_rate: u32,
}

/// Quantization range the client asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRange {
    Jpeg,
    Mpeg,
}

impl ColorRange {
    /// GStreamer `chroma-site`/range name used in pipeline templates
    pub fn as_gst_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Mpeg => "mpeg2",
        }
    }
}

/// Colorimetry the client asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Bt601,
    Bt709,
    Bt2020,
}

impl ColorSpace {
    pub fn as_gst_str(self) -> &'static str {
        match self {
            Self::Bt601 => "bt601",
            Self::Bt709 => "bt709",
            Self::Bt2020 => "bt2020",
        }
    }

    /// Decode the client's `encoderCscMode`: bit 0 is the range, the
    /// remaining bits the color space. Unknown spaces fall back to BT.601.
    pub fn from_csc_mode(csc: u32) -> (ColorRange, ColorSpace) {
        let range = if csc & 0x1 != 0 {
            ColorRange::Jpeg
        } else {
            ColorRange::Mpeg
        };
        let space = match csc >> 1 {
            1 => ColorSpace::Bt709,
            2 => ColorSpace::Bt2020,
            _ => ColorSpace::Bt601,
        };
        (range, space)
    }
}

/// Parameters of one client's video stream
#[derive(Debug, Clone)]
pub struct VideoSession {
    pub session_id: SessionId,
    pub display_mode: DisplayMode,
    /// Unrendered pipeline template of the app being streamed
    pub gst_pipeline: Arc<str>,
    pub port: u16,
    pub timeout: Duration,
    pub packet_size: u32,
    pub frames_with_invalid_ref_threshold: u32,
    pub fec_percentage: u32,
    pub min_required_fec_packets: u32,
    pub bitrate_kbps: u32,
    pub slices_per_frame: u32,
    pub color_range: ColorRange,
    pub color_space: ColorSpace,
    pub client_ip: String,
    pub event_bus: EventBus,
}

/// Parameters of one client's audio stream
#[derive(Debug, Clone)]
pub struct AudioSession {
    pub session_id: SessionId,
    /// Unrendered pipeline template of the app being streamed
    pub gst_pipeline: Arc<str>,
    pub encrypt_audio: bool,
    pub aes_key: String,
    pub aes_iv: String,
    pub port: u16,
    pub client_ip: String,
    /// Milliseconds of audio per packet
    pub packet_duration: u32,
    pub channels: u32,
    /// Bits per second
    pub bitrate: u32,
    pub event_bus: EventBus,
}
