mod common;

use common::FakeEngine;
use gamestream_host::error::ConfigError;
use gamestream_host::state::{CodecFamily, Config, PairedClient, CONFIG_VERSION};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const LAB_CONFIG: &str = r#"
uuid = "3b9f5c3e-lab"
hostname = "Lab"
support_hevc = true
config_version = 2
paired_clients = [{ client_cert = "CERT-A", run_uid = 1001 }]

[[apps]]
title = "Desktop"

[apps.video]
source = "waylanddisplaysrc"

[[apps]]
title = "Steam"
support_hdr = true
start_virtual_compositor = false

[apps.runner]
type = "docker"
name = "steam"
image = "steam:edge"

[apps.audio]
sink = "fakesink"

[gstreamer.video]
default_source = "videotestsrc"
default_sink = "moonlight_sink port={client_port}"

[[gstreamer.video.hevc_encoders]]
plugin_name = "nvcodec"
video_params = "cudaupload"
encoder_pipeline = "nvh265enc"

[[gstreamer.video.hevc_encoders]]
plugin_name = "x265"
video_params = "videoconvert"
encoder_pipeline = "x265enc"

[[gstreamer.video.h264_encoders]]
plugin_name = "nvcodec"
video_params = "cudaupload"
encoder_pipeline = "nvh264enc"

[[gstreamer.video.h264_encoders]]
plugin_name = "x264"
video_params = "videoconvert ! video/x-raw, format=I420"
encoder_pipeline = "x264enc bitrate={bitrate}"

[gstreamer.audio]
default_source = "pulsesrc"
default_audio_params = "audio/x-raw, channels={channels}"
default_opus_encoder = "opusenc"
default_sink = "moonlight_audio"
"#;

fn software_engine() -> FakeEngine {
    FakeEngine::with_plugins(&["x264", "x265"])
}

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

fn saved_certs(path: &Path) -> Vec<String> {
    let doc: toml::Table = fs::read_to_string(path).unwrap().parse().unwrap();
    doc["paired_clients"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["client_cert"].as_str().unwrap().to_string())
        .collect()
}

fn memory_certs(config: &Config) -> Vec<String> {
    config
        .paired_clients
        .load()
        .iter()
        .map(|c| c.client_cert.clone())
        .collect()
}

#[test]
fn test_first_run_writes_default_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let config = Config::load_or_default(&path, &software_engine()).unwrap();
    assert!(path.exists());
    assert!(!config.uuid.is_empty());
    assert!(config.paired_clients.is_empty());
    assert_eq!(config.apps.len(), 1);
    assert_eq!(config.apps[0].title, "Test ball");
    assert_eq!(config.apps[0].id, "1");

    let doc: toml::Table = fs::read_to_string(&path).unwrap().parse().unwrap();
    assert_eq!(doc["uuid"].as_str(), Some(config.uuid.as_str()));
    assert_eq!(doc["config_version"].as_integer(), Some(CONFIG_VERSION));

    // The identity is stable across restarts.
    let reloaded = Config::load_or_default(&path, &software_engine()).unwrap();
    assert_eq!(reloaded.uuid, config.uuid);
}

#[test]
fn test_default_config_resolves_software_encoders() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let config = Config::load_or_default(&path, &software_engine()).unwrap();
    let app = &config.apps[0];

    assert!(app.h264_gst_pipeline.starts_with("videotestsrc pattern=ball"));
    assert!(app.h264_gst_pipeline.contains("x264enc"));
    assert!(app.hevc_gst_pipeline.contains("x265enc"));
    assert!(app.opus_gst_pipeline.starts_with("audiotestsrc"));
    assert!(app.opus_gst_pipeline.contains("rtpmoonlightpay_audio name=moonlight_pay"));
}

#[test]
fn test_resolved_h264_pipeline() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, LAB_CONFIG);

    let config = Config::load_or_default(&path, &software_engine()).unwrap();

    let desktop = config.find_app("1").unwrap();
    assert_eq!(
        &*desktop.h264_gst_pipeline,
        "waylanddisplaysrc ! videoconvert ! video/x-raw, format=I420 ! \
         x264enc bitrate={bitrate} ! moonlight_sink port={client_port}"
    );
    assert_eq!(
        &*desktop.hevc_gst_pipeline,
        "waylanddisplaysrc ! videoconvert ! x265enc ! moonlight_sink port={client_port}"
    );
    assert!(desktop.start_virtual_compositor);
    assert!(!desktop.support_hdr);

    let steam = config.find_app("2").unwrap();
    assert_eq!(steam.title, "Steam");
    assert!(steam.support_hdr);
    assert!(!steam.start_virtual_compositor);
    assert_eq!(
        &*steam.opus_gst_pipeline,
        "pulsesrc ! audio/x-raw, channels={channels} ! opusenc ! fakesink"
    );
    assert_eq!(steam.runner.serialize()["type"].as_str(), Some("docker"));

    assert!(config.find_app("3").is_none());
    assert_eq!(config.hostname, "Lab");
    assert!(config.support_hevc);
}

#[test]
fn test_first_available_encoder_wins() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, LAB_CONFIG);

    let engine = FakeEngine::with_plugins(&["x264", "nvcodec", "x265"]);
    let config = Config::load_or_default(&path, &engine).unwrap();

    let desktop = config.find_app("1").unwrap();
    assert!(desktop.h264_gst_pipeline.contains("nvh264enc"));
    assert!(desktop.hevc_gst_pipeline.contains("nvh265enc"));
}

#[test]
fn test_missing_encoder_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, LAB_CONFIG);

    let err = Config::load_or_default(&path, &FakeEngine::new()).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::NoCompatibleEncoder {
            family: CodecFamily::H264
        }
    ));

    let err = Config::load_or_default(&path, &FakeEngine::with_plugins(&["x264"])).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::NoCompatibleEncoder {
            family: CodecFamily::Hevc
        }
    ));
    assert!(err.to_string().contains("[[gstreamer.video.hevc_encoders]]"));
}

#[test]
fn test_v1_config_is_migrated() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
uuid = "legacy-uuid"
hostname = "Old host"
support_hevc = true
paired_clients = [{ client_cert = "CERT-1", run_uid = 5 }, { client_cert = "CERT-2" }]

[[apps]]
title = "Legacy app"
"#,
    );

    let config = Config::load_or_default(&path, &software_engine()).unwrap();
    assert_eq!(config.uuid, "legacy-uuid");
    assert_eq!(config.hostname, "Old host");
    assert!(config.support_hevc);
    assert_eq!(memory_certs(&config), vec!["CERT-1", "CERT-2"]);
    // Only certificates are carried over.
    assert_eq!(config.paired_clients.find("CERT-1").unwrap().run_uid, 1000);
    // Apps come from the new defaults.
    assert_eq!(config.apps[0].title, "Test ball");

    let doc: toml::Table = fs::read_to_string(&path).unwrap().parse().unwrap();
    assert_eq!(doc["config_version"].as_integer(), Some(CONFIG_VERSION));
    assert_eq!(doc["uuid"].as_str(), Some("legacy-uuid"));
    assert_eq!(saved_certs(&path), vec!["CERT-1", "CERT-2"]);

    let reloaded = Config::load_or_default(&path, &software_engine()).unwrap();
    assert_eq!(reloaded.uuid, "legacy-uuid");
    assert_eq!(memory_certs(&reloaded), vec!["CERT-1", "CERT-2"]);
}

#[test]
fn test_invalid_document_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "config_version = 2\nhostname = [");

    let err = Config::load_or_default(&path, &software_engine()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_pair_then_unpair_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, LAB_CONFIG);
    let config = Config::load_or_default(&path, &software_engine()).unwrap();

    let mut client = PairedClient::new("CERT-B");
    client.run_uid = 1002;
    config.pair(&client).unwrap();

    assert!(config.is_paired("CERT-B"));
    assert_eq!(memory_certs(&config), vec!["CERT-A", "CERT-B"]);
    assert_eq!(saved_certs(&path), vec!["CERT-A", "CERT-B"]);

    let reloaded = Config::load_or_default(&path, &software_engine()).unwrap();
    assert_eq!(reloaded.paired_clients.find("CERT-B").unwrap().run_uid, 1002);
    assert_eq!(reloaded.paired_clients.find("CERT-A").unwrap().run_uid, 1001);

    config.unpair(&client).unwrap();
    assert!(!config.is_paired("CERT-B"));
    assert_eq!(memory_certs(&config), vec!["CERT-A"]);
    assert_eq!(saved_certs(&path), vec!["CERT-A"]);

    // Apps and encoders are untouched by pairing rewrites.
    let reloaded = Config::load_or_default(&path, &software_engine()).unwrap();
    assert_eq!(reloaded.apps.len(), 2);
    assert_eq!(reloaded.uuid, "3b9f5c3e-lab");
}

#[test]
fn test_unpair_unknown_client_is_noop() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, LAB_CONFIG);
    let config = Config::load_or_default(&path, &software_engine()).unwrap();

    let before = fs::read_to_string(&path).unwrap();
    config.unpair(&PairedClient::new("NOPE")).unwrap();

    assert_eq!(memory_certs(&config), vec!["CERT-A"]);
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_pairing_again_replaces_the_record() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, LAB_CONFIG);
    let config = Config::load_or_default(&path, &software_engine()).unwrap();

    let mut client = PairedClient::new("CERT-A");
    client.run_gid = 2000;
    config.pair(&client).unwrap();

    assert_eq!(memory_certs(&config), vec!["CERT-A"]);
    assert_eq!(config.paired_clients.find("CERT-A").unwrap().run_gid, 2000);
    assert_eq!(saved_certs(&path), vec!["CERT-A"]);
}

#[test]
fn test_concurrent_pairing_keeps_every_client() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, LAB_CONFIG);
    let config = Arc::new(Config::load_or_default(&path, &software_engine()).unwrap());

    let writers: Vec<_> = (0..8)
        .map(|i| {
            let config = Arc::clone(&config);
            thread::spawn(move || {
                for j in 0..5 {
                    config.pair(&PairedClient::new(format!("CERT-{i}-{j}"))).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(config.paired_clients.len(), 41);
    let mut saved = saved_certs(&path);
    let mut memory = memory_certs(&config);
    saved.sort();
    memory.sort();
    assert_eq!(saved, memory);
}
