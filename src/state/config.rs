use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::path::PathBuf;
use std::sync::Arc;

use crate::runners::Runner;

fn default_run_id() -> u32 {
    1000
}

/// A client that completed pairing, and the identity its apps run as
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairedClient {
    pub client_cert: String,
    #[serde(default = "default_run_id")]
    pub run_uid: u32,
    #[serde(default = "default_run_id")]
    pub run_gid: u32,
}

impl PairedClient {
    pub fn new(client_cert: impl Into<String>) -> Self {
        Self {
            client_cert: client_cert.into(),
            run_uid: default_run_id(),
            run_gid: default_run_id(),
        }
    }
}

// Clients are identified by their certificate alone.
impl PartialEq for PairedClient {
    fn eq(&self, other: &Self) -> bool {
        self.client_cert == other.client_cert
    }
}

impl Eq for PairedClient {}

/// Paired clients as an immutable snapshot behind an atomic pointer
///
/// Readers take a snapshot without locking. Writers build a complete new
/// list and swap it in, retrying if another writer swapped first, so no
/// reader ever sees a half-updated list and no concurrent update is lost.
#[derive(Debug)]
pub struct PairedClientList {
    inner: ArcSwap<Vec<PairedClient>>,
}

impl PairedClientList {
    pub fn new(clients: Vec<PairedClient>) -> Self {
        Self {
            inner: ArcSwap::from_pointee(clients),
        }
    }

    pub fn load(&self) -> Arc<Vec<PairedClient>> {
        self.inner.load_full()
    }

    pub fn find(&self, client_cert: &str) -> Option<PairedClient> {
        self.inner
            .load()
            .iter()
            .find(|client| client.client_cert == client_cert)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the whole list with `f(current)`
    ///
    /// `f` may run more than once when writers race.
    pub fn update<F>(&self, mut f: F)
    where
        F: FnMut(&[PairedClient]) -> Vec<PairedClient>,
    {
        self.inner.rcu(|current| f(current.as_slice()));
    }
}

/// A streamable application, resolved at config load time
#[derive(Debug, Clone)]
pub struct App {
    pub title: String,
    /// 1-based position in the config, stable for the process lifetime
    pub id: String,
    pub support_hdr: bool,
    pub h264_gst_pipeline: Arc<str>,
    pub hevc_gst_pipeline: Arc<str>,
    pub opus_gst_pipeline: Arc<str>,
    pub start_virtual_compositor: bool,
    pub runner: Arc<dyn Runner>,
}

impl App {
    /// Exported record: `{title, support_hdr, runner}`
    pub fn to_toml(&self) -> toml::Table {
        let mut table = toml::Table::new();
        table.insert("title".to_string(), self.title.clone().into());
        table.insert("support_hdr".to_string(), self.support_hdr.into());
        table.insert("runner".to_string(), toml::Value::Table(self.runner.serialize()));
        table
    }
}

impl Serialize for App {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut record = serializer.serialize_struct("App", 3)?;
        record.serialize_field("title", &self.title)?;
        record.serialize_field("support_hdr", &self.support_hdr)?;
        record.serialize_field("runner", &self.runner.serialize())?;
        record.end()
    }
}

/// Host configuration resolved from the TOML document at `config_source`
#[derive(Debug)]
pub struct Config {
    pub uuid: String,
    pub hostname: String,
    pub config_source: PathBuf,
    pub support_hevc: bool,
    pub paired_clients: PairedClientList,
    pub apps: Vec<App>,
    /// Held across every read-modify-write of `config_source`
    pub(crate) file_lock: Mutex<()>,
}

impl Config {
    pub fn find_app(&self, id: &str) -> Option<&App> {
        self.apps.iter().find(|app| app.id == id)
    }

    pub fn is_paired(&self, client_cert: &str) -> bool {
        self.paired_clients.find(client_cert).is_some()
    }
}
