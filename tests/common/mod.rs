//! In-memory media engine shared by the integration tests

#![allow(dead_code)]

use gamestream_host::error::PipelineError;
use gamestream_host::pipeline::{
    BusMessage, MediaEngine, MediaPipeline, MessageWatch, PipelineElement, PipelineState,
    UpstreamEvent,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Everything a `FakePipeline` was asked to do
#[derive(Default)]
pub struct Recorded {
    pub states: Vec<PipelineState>,
    pub events: Vec<(String, UpstreamEvent)>,
    pub watch: Option<Arc<MessageWatch>>,
    pub watch_removed: bool,
}

pub struct FakePipeline {
    pub description: String,
    elements: HashSet<String>,
    pub recorded: Arc<Mutex<Recorded>>,
}

impl FakePipeline {
    /// Post a diagnostic message as the engine would
    pub fn post(&self, message: BusMessage) {
        let watch = self.recorded.lock().watch.clone();
        if let Some(watch) = watch {
            watch(message);
        }
    }

    pub fn states(&self) -> Vec<PipelineState> {
        self.recorded.lock().states.clone()
    }

    pub fn events(&self) -> Vec<(String, UpstreamEvent)> {
        self.recorded.lock().events.clone()
    }

    pub fn watch_removed(&self) -> bool {
        self.recorded.lock().watch_removed
    }
}

impl MediaPipeline for FakePipeline {
    fn set_state(&self, state: PipelineState) -> Result<(), PipelineError> {
        self.recorded.lock().states.push(state);
        Ok(())
    }

    fn add_watch(&self, watch: MessageWatch) -> Result<(), PipelineError> {
        self.recorded.lock().watch = Some(Arc::new(watch));
        Ok(())
    }

    fn remove_watch(&self) {
        let mut recorded = self.recorded.lock();
        recorded.watch = None;
        recorded.watch_removed = true;
    }

    fn element(&self, name: &str) -> Option<Box<dyn PipelineElement>> {
        if !self.elements.contains(name) {
            return None;
        }
        Some(Box::new(FakeElement {
            name: name.to_string(),
            recorded: Arc::clone(&self.recorded),
        }))
    }
}

struct FakeElement {
    name: String,
    recorded: Arc<Mutex<Recorded>>,
}

impl PipelineElement for FakeElement {
    fn name(&self) -> &str {
        &self.name
    }

    fn send_event(&self, event: UpstreamEvent) -> bool {
        self.recorded.lock().events.push((self.name.clone(), event));
        true
    }
}

/// Engine that "parses" any description not containing `INVALID`
///
/// Every element named with `name=<x>` in the description can be looked up.
#[derive(Default)]
pub struct FakeEngine {
    plugins: HashSet<String>,
    launched: Mutex<Vec<Arc<FakePipeline>>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugins(plugins: &[&str]) -> Self {
        Self {
            plugins: plugins.iter().map(|p| p.to_string()).collect(),
            launched: Mutex::new(Vec::new()),
        }
    }

    pub fn launched(&self) -> Vec<Arc<FakePipeline>> {
        self.launched.lock().clone()
    }

    /// Wait for the `n`th launched pipeline to be handed out
    pub fn wait_for_pipeline(&self, n: usize) -> Arc<FakePipeline> {
        wait_until(|| self.launched.lock().len() > n);
        Arc::clone(&self.launched.lock()[n])
    }
}

impl MediaEngine for FakeEngine {
    fn name(&self) -> &str {
        "FAKE"
    }

    fn launch(&self, description: &str) -> Result<Arc<dyn MediaPipeline>, PipelineError> {
        if description.contains("INVALID") {
            return Err(PipelineError::Parse(format!(
                "no element \"INVALID\" in {}",
                description
            )));
        }

        let elements = description
            .split_whitespace()
            .filter_map(|token| token.strip_prefix("name="))
            .map(str::to_string)
            .collect();

        let pipeline = Arc::new(FakePipeline {
            description: description.to_string(),
            elements,
            recorded: Arc::new(Mutex::new(Recorded::default())),
        });
        self.launched.lock().push(Arc::clone(&pipeline));
        Ok(pipeline)
    }

    fn is_plugin_available(&self, plugin_name: &str) -> bool {
        self.plugins.contains(plugin_name)
    }
}

/// Poll `condition` until it holds, panicking after a few seconds
pub fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}
