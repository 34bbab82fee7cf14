use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::error::ConfigError;

/// Compression standard a group of interchangeable encoders implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecFamily {
    H264,
    Hevc,
}

impl CodecFamily {
    /// Key of this family's catalog under `[gstreamer.video]`
    pub fn catalog_key(self) -> &'static str {
        match self {
            Self::H264 => "h264_encoders",
            Self::Hevc => "hevc_encoders",
        }
    }
}

impl fmt::Display for CodecFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H264 => f.write_str("H264"),
            Self::Hevc => f.write_str("HEVC"),
        }
    }
}

/// One entry of an encoder catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GstEncoder {
    /// GStreamer plugin that must be installed for this entry to be usable
    pub plugin_name: String,
    /// Caps/conversion fragment placed between source and encoder
    pub video_params: String,
    /// Encoder fragment (encoder element plus parser)
    pub encoder_pipeline: String,
}

/// Pick the first encoder of `catalog` whose plugin is available
///
/// The catalog is ordered by preference. There is no scoring: an earlier
/// available entry always wins over a later one.
pub fn select_encoder<'a, P>(
    family: CodecFamily,
    catalog: &'a [GstEncoder],
    is_available: P,
) -> Result<&'a GstEncoder, ConfigError>
where
    P: Fn(&str) -> bool,
{
    let encoder = catalog
        .iter()
        .find(|encoder| {
            let available = is_available(&encoder.plugin_name);
            debug!("{} encoder {}: available={}", family, encoder.plugin_name, available);
            available
        })
        .ok_or(ConfigError::NoCompatibleEncoder { family })?;

    info!("Selected {} encoder: {}", family, encoder.plugin_name);
    Ok(encoder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn encoder(name: &str) -> GstEncoder {
        GstEncoder {
            plugin_name: name.to_string(),
            video_params: format!("{name}-params"),
            encoder_pipeline: format!("{name}enc"),
        }
    }

    fn catalog() -> Vec<GstEncoder> {
        vec![encoder("nvcodec"), encoder("vaapi"), encoder("x264")]
    }

    #[test]
    fn test_first_available_wins() {
        let catalog = catalog();
        let selected =
            select_encoder(CodecFamily::H264, &catalog, |name| name == "vaapi" || name == "x264")
                .unwrap();
        assert_eq!(selected.plugin_name, "vaapi");
    }

    #[test]
    fn test_most_preferred_when_everything_available() {
        let catalog = catalog();
        let selected = select_encoder(CodecFamily::H264, &catalog, |_| true).unwrap();
        assert_eq!(selected.plugin_name, "nvcodec");
    }

    #[test]
    fn test_probing_stops_at_first_match() {
        let catalog = catalog();
        let probed = RefCell::new(Vec::new());
        select_encoder(CodecFamily::Hevc, &catalog, |name| {
            probed.borrow_mut().push(name.to_string());
            name == "vaapi"
        })
        .unwrap();
        assert_eq!(*probed.borrow(), vec!["nvcodec", "vaapi"]);
    }

    #[test]
    fn test_every_subset_selects_earliest() {
        let catalog = catalog();
        let names: Vec<&str> = catalog.iter().map(|e| e.plugin_name.as_str()).collect();

        for mask in 0u8..8 {
            let available: Vec<&str> = names
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << *i) != 0)
                .map(|(_, n)| *n)
                .collect();

            let result = select_encoder(CodecFamily::H264, &catalog, |name| available.contains(&name));
            match names.iter().find(|n| available.contains(*n)) {
                Some(expected) => assert_eq!(result.unwrap().plugin_name, *expected),
                None => assert!(result.is_err()),
            }
        }
    }

    #[test]
    fn test_none_available_is_fatal() {
        let catalog = catalog();
        let err = select_encoder(CodecFamily::Hevc, &catalog, |_| false).unwrap_err();
        assert!(matches!(err, ConfigError::NoCompatibleEncoder { family: CodecFamily::Hevc }));
        assert!(err.to_string().contains("[[gstreamer.video.hevc_encoders]]"));
    }

    #[test]
    fn test_empty_catalog_is_fatal() {
        assert!(select_encoder(CodecFamily::H264, &[], |_| true).is_err());
    }
}
