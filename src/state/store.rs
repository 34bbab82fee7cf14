//! Loading, migrating and persisting the host's TOML configuration

use parking_lot::Mutex;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::config::{App, Config, PairedClient, PairedClientList};
use super::encoders::{select_encoder, CodecFamily};
use super::templates::{
    resolve_app_pipelines, AudioOverrides, GstAudioCfg, GstVideoCfg, VideoOverrides,
};
use crate::error::ConfigError;
use crate::pipeline::MediaEngine;
use crate::runners;

const DEFAULT_CONFIG: &str = include_str!("../../assets/default_config.toml");

/// Schema version written by this host
pub const CONFIG_VERSION: i64 = 2;

pub const DEFAULT_HOSTNAME: &str = "GameStream Host";

#[derive(Debug, Deserialize)]
struct GstreamerCfg {
    video: GstVideoCfg,
    audio: GstAudioCfg,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct AppEntry {
    title: String,
    #[serde(default)]
    support_hdr: bool,
    #[serde(default = "default_true")]
    start_virtual_compositor: bool,
    #[serde(default)]
    video: VideoOverrides,
    #[serde(default)]
    audio: AudioOverrides,
    runner: Option<toml::Table>,
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    uuid: Option<String>,
    hostname: Option<String>,
    #[serde(default)]
    support_hevc: bool,
    #[serde(default)]
    paired_clients: Vec<PairedClient>,
    #[serde(default)]
    apps: Vec<AppEntry>,
    gstreamer: GstreamerCfg,
}

fn gen_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The built-in default document, identified by `uuid`
pub fn default_document(uuid: &str) -> String {
    format!(
        "# A unique identifier for this host\nuuid = \"{}\"\n{}",
        uuid, DEFAULT_CONFIG
    )
}

fn create_default(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
    }
    fs::write(path, default_document(&gen_uuid())).map_err(|e| ConfigError::io(path, e))
}

fn read_document(path: &Path) -> Result<toml::Table, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    Ok(content.parse::<toml::Table>()?)
}

/// Replace `path` with `document`
///
/// Written to a sibling file first and renamed over, so a crash mid-write
/// never leaves a truncated config behind.
fn write_document(document: &toml::Table, path: &Path) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(document)?;
    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, content).map_err(|e| ConfigError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| ConfigError::io(path, e))
}

/// Bring a version 1 document to the current schema
///
/// Starts from a fresh default document and carries over the host identity
/// and the paired client certificates; every other v1 field is dropped.
/// The result replaces the file at `path`.
pub fn migrate_v1_to_v2(v1: &toml::Table, path: &Path) -> Result<toml::Table, ConfigError> {
    let mut v2: toml::Table = default_document(&gen_uuid()).parse()?;

    for key in ["hostname", "uuid", "support_hevc"] {
        if let Some(value) = v1.get(key) {
            v2.insert(key.to_string(), value.clone());
        }
    }

    let clients: toml::value::Array = v1
        .get("paired_clients")
        .and_then(toml::Value::as_array)
        .map(|clients| {
            clients
                .iter()
                .filter_map(|client| client.get("client_cert").and_then(toml::Value::as_str))
                .map(|cert| {
                    let mut table = toml::Table::new();
                    table.insert("client_cert".to_string(), cert.into());
                    toml::Value::Table(table)
                })
                .collect()
        })
        .unwrap_or_default();
    v2.insert("paired_clients".to_string(), toml::Value::Array(clients));

    write_document(&v2, path)?;
    Ok(v2)
}

fn paired_clients_mut(document: &mut toml::Table) -> Result<&mut toml::value::Array, ConfigError> {
    document
        .entry("paired_clients")
        .or_insert(toml::Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or(ConfigError::InvalidKey("paired_clients"))
}

fn is_cert(value: &toml::Value, client_cert: &str) -> bool {
    value.get("client_cert").and_then(toml::Value::as_str) == Some(client_cert)
}

impl Config {
    /// Load the config at `path`, creating or migrating it first if needed
    ///
    /// Encoders are selected here, once per codec family, by probing
    /// `engine`; a family without any available encoder is fatal.
    pub fn load_or_default(
        path: impl AsRef<Path>,
        engine: &dyn MediaEngine,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            warn!(
                "Unable to open config file: {}, creating one using defaults",
                path.display()
            );
            create_default(path)?;
        }

        let mut document = read_document(path)?;
        let version = document
            .get("config_version")
            .and_then(toml::Value::as_integer)
            .unwrap_or(1);
        if version <= 1 {
            warn!("Found old config file, migrating to newer version");
            document = migrate_v1_to_v2(&document, path)?;
        }

        let cfg: ConfigDocument = toml::Value::Table(document).try_into()?;

        let video = &cfg.gstreamer.video;
        let audio = &cfg.gstreamer.audio;
        let probe = |name: &str| engine.is_plugin_available(name);
        let h264_encoder = select_encoder(CodecFamily::H264, &video.h264_encoders, probe)?;
        let hevc_encoder = select_encoder(CodecFamily::Hevc, &video.hevc_encoders, probe)?;

        let apps: Vec<App> = cfg
            .apps
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let pipelines = resolve_app_pipelines(
                    &item.video,
                    &item.audio,
                    video,
                    audio,
                    h264_encoder,
                    hevc_encoder,
                );
                App {
                    title: item.title.clone(),
                    id: (idx + 1).to_string(),
                    support_hdr: item.support_hdr,
                    h264_gst_pipeline: Arc::from(pipelines.h264),
                    hevc_gst_pipeline: Arc::from(pipelines.hevc),
                    opus_gst_pipeline: Arc::from(pipelines.opus),
                    start_virtual_compositor: item.start_virtual_compositor,
                    runner: runners::from_toml(item.runner.as_ref()),
                }
            })
            .collect();

        info!(
            "Loaded config {}: {} apps, {} paired clients",
            path.display(),
            apps.len(),
            cfg.paired_clients.len()
        );

        Ok(Self {
            uuid: cfg.uuid.unwrap_or_else(gen_uuid),
            hostname: cfg.hostname.unwrap_or_else(|| DEFAULT_HOSTNAME.to_string()),
            config_source: path.to_path_buf(),
            support_hevc: cfg.support_hevc,
            paired_clients: PairedClientList::new(cfg.paired_clients),
            apps,
            file_lock: Mutex::new(()),
        })
    }

    /// Pair `client`, in memory first and then on disk
    ///
    /// A client already paired under the same certificate is replaced, so
    /// certificates stay unique. A failed write leaves the in-memory change
    /// in place.
    pub fn pair(&self, client: &PairedClient) -> Result<(), ConfigError> {
        let _file = self.file_lock.lock();

        self.paired_clients.update(|clients| {
            clients
                .iter()
                .filter(|c| *c != client)
                .cloned()
                .chain(std::iter::once(client.clone()))
                .collect()
        });

        let mut document = read_document(&self.config_source)?;
        let saved = paired_clients_mut(&mut document)?;
        saved.retain(|value| !is_cert(value, &client.client_cert));
        saved.push(toml::Value::try_from(client)?);
        write_document(&document, &self.config_source)?;

        info!("Paired client, {} clients now paired", self.paired_clients.len());
        Ok(())
    }

    /// Remove `client` (matched by certificate) from memory and disk
    ///
    /// Unpairing a client that is not paired is a no-op.
    pub fn unpair(&self, client: &PairedClient) -> Result<(), ConfigError> {
        let _file = self.file_lock.lock();

        self.paired_clients.update(|clients| {
            clients
                .iter()
                .filter(|c| c.client_cert != client.client_cert)
                .cloned()
                .collect()
        });

        let mut document = read_document(&self.config_source)?;
        let saved = paired_clients_mut(&mut document)?;
        let before = saved.len();
        saved.retain(|value| !is_cert(value, &client.client_cert));
        if saved.len() != before {
            write_document(&document, &self.config_source)?;
            info!("Unpaired client, {} clients now paired", self.paired_clients.len());
        }
        Ok(())
    }
}
