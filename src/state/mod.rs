//! Host configuration: apps, pairing list and encoder catalogs

pub mod config;
pub mod encoders;
pub mod sessions;
pub mod store;
pub mod templates;

pub use config::{App, Config, PairedClient, PairedClientList};
pub use encoders::{select_encoder, CodecFamily, GstEncoder};
pub use sessions::{AudioSession, ColorRange, ColorSpace, DisplayMode, VideoSession};
pub use store::{default_document, migrate_v1_to_v2, CONFIG_VERSION, DEFAULT_HOSTNAME};
pub use templates::{
    resolve_app_pipelines, AppPipelines, AudioOverrides, GstAudioCfg, GstVideoCfg,
    VideoOverrides,
};
