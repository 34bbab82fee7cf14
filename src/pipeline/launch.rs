//! Media engine backed by the GStreamer command line tools
//!
//! Each pipeline runs as a `gst-launch-1.0` child process and plugins are
//! probed with `gst-inspect-1.0`. No GStreamer libraries are linked, which
//! keeps the host buildable anywhere, at the cost of live event injection:
//! elements inside a child process cannot be looked up, so forced keyframes
//! are not available with this engine.

use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use super::engine::{
    BusMessage, MediaEngine, MediaPipeline, MessageWatch, PipelineElement, PipelineState,
};
use crate::error::PipelineError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Engine spawning `gst-launch-1.0` per pipeline
#[derive(Debug, Clone)]
pub struct LaunchEngine {
    launch_bin: PathBuf,
    inspect_bin: PathBuf,
}

impl LaunchEngine {
    pub fn new() -> Self {
        Self::with_binaries("gst-launch-1.0", "gst-inspect-1.0")
    }

    pub fn with_binaries(launch_bin: impl Into<PathBuf>, inspect_bin: impl Into<PathBuf>) -> Self {
        Self {
            launch_bin: launch_bin.into(),
            inspect_bin: inspect_bin.into(),
        }
    }
}

impl Default for LaunchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaEngine for LaunchEngine {
    fn name(&self) -> &str {
        "GST-LAUNCH"
    }

    fn launch(&self, description: &str) -> Result<Arc<dyn MediaPipeline>, PipelineError> {
        validate_description(description)?;
        Ok(Arc::new(LaunchPipeline {
            launch_bin: self.launch_bin.clone(),
            description: description.to_string(),
            shared: Arc::new(Mutex::new(Shared::default())),
        }))
    }

    fn is_plugin_available(&self, plugin_name: &str) -> bool {
        match Command::new(&self.inspect_bin)
            .arg(plugin_name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) => status.success(),
            Err(e) => {
                warn!("Failed to run {}: {}", self.inspect_bin.display(), e);
                false
            }
        }
    }
}

/// Syntactic check done before anything is spawned: an empty description or
/// an empty link (`a ! ! b`) would only fail later inside the child.
fn validate_description(description: &str) -> Result<(), PipelineError> {
    if description.trim().is_empty() {
        return Err(PipelineError::Parse("empty pipeline description".to_string()));
    }
    if let Some(idx) = description.split('!').position(|segment| segment.trim().is_empty()) {
        return Err(PipelineError::Parse(format!(
            "empty element at link {} in `{}`",
            idx, description
        )));
    }
    Ok(())
}

#[derive(Default)]
struct Shared {
    child: Option<Child>,
    watch: Option<Arc<MessageWatch>>,
}

struct LaunchPipeline {
    launch_bin: PathBuf,
    description: String,
    shared: Arc<Mutex<Shared>>,
}

impl LaunchPipeline {
    fn play(&self) -> Result<(), PipelineError> {
        let mut shared = self.shared.lock();
        if shared.child.is_some() {
            return Ok(());
        }

        let child = Command::new(&self.launch_bin)
            .arg("-e")
            .arg(&self.description)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| PipelineError::StateChange {
                state: PipelineState::Playing,
                reason: format!("failed to spawn {}: {}", self.launch_bin.display(), e),
            })?;

        info!("Spawned {} (pid {})", self.launch_bin.display(), child.id());
        shared.child = Some(child);
        drop(shared);

        let monitored = Arc::clone(&self.shared);
        let bin = self.launch_bin.display().to_string();
        thread::Builder::new()
            .name("gst-launch-monitor".to_string())
            .spawn(move || monitor(monitored, bin))
            .map_err(|e| PipelineError::Engine(format!("failed to spawn monitor thread: {}", e)))?;

        Ok(())
    }

    fn stop(&self) {
        let child = self.shared.lock().child.take();
        if let Some(mut child) = child {
            debug!("Stopping pid {}", child.id());
            if let Err(e) = child.kill() {
                warn!("Failed to kill pid {}: {}", child.id(), e);
            }
            let _ = child.wait();
        }
    }
}

/// Post EndOfStream/Error on the watch once the child exits on its own
fn monitor(shared: Arc<Mutex<Shared>>, bin: String) {
    loop {
        thread::sleep(POLL_INTERVAL);

        let (status, watch) = {
            let mut guard = shared.lock();
            let status = match guard.child.as_mut() {
                // Stopped by the runner, nothing to report.
                None => return,
                Some(child) => match child.try_wait() {
                    Ok(Some(status)) => Ok(status),
                    Ok(None) => continue,
                    Err(e) => Err(e),
                },
            };
            guard.child = None;
            (status, guard.watch.clone())
        };

        let message = match status {
            Ok(status) if status.success() => BusMessage::EndOfStream,
            Ok(status) => BusMessage::Error {
                source: Some(bin.clone()),
                message: format!("{} exited with {}", bin, status),
                debug: None,
            },
            Err(e) => BusMessage::Error {
                source: Some(bin.clone()),
                message: format!("failed to poll {}: {}", bin, e),
                debug: None,
            },
        };

        if let Some(watch) = watch {
            watch(message);
        }
        return;
    }
}

impl MediaPipeline for LaunchPipeline {
    fn set_state(&self, state: PipelineState) -> Result<(), PipelineError> {
        match state {
            PipelineState::Playing => self.play(),
            PipelineState::Null => {
                self.stop();
                Ok(())
            }
            // A child process has no intermediate states.
            PipelineState::Paused | PipelineState::Ready => {
                trace!("Ignoring transition to {:?}", state);
                Ok(())
            }
        }
    }

    fn add_watch(&self, watch: MessageWatch) -> Result<(), PipelineError> {
        self.shared.lock().watch = Some(Arc::new(watch));
        Ok(())
    }

    fn remove_watch(&self) {
        self.shared.lock().watch = None;
    }

    fn element(&self, name: &str) -> Option<Box<dyn PipelineElement>> {
        debug!("Element lookup for `{}` is not supported by gst-launch", name);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_description() {
        let engine = LaunchEngine::new();
        assert!(matches!(engine.launch("   "), Err(PipelineError::Parse(_))));
    }

    #[test]
    fn test_rejects_empty_link() {
        let engine = LaunchEngine::new();
        let err = engine.launch("videotestsrc ! ! fakesink").err().unwrap();
        assert!(matches!(err, PipelineError::Parse(msg) if msg.contains("link 1")));
    }

    #[test]
    fn test_launch_does_not_spawn() {
        let engine = LaunchEngine::with_binaries("/nonexistent/gst-launch", "/nonexistent/gst-inspect");
        assert!(engine.launch("videotestsrc ! fakesink").is_ok());
    }

    #[test]
    fn test_missing_inspect_binary_means_unavailable() {
        let engine = LaunchEngine::with_binaries("/nonexistent/gst-launch", "/nonexistent/gst-inspect");
        assert!(!engine.is_plugin_available("x264"));
    }

    #[test]
    fn test_spawn_failure_is_a_state_change_error() {
        let engine = LaunchEngine::with_binaries("/nonexistent/gst-launch", "/nonexistent/gst-inspect");
        let pipeline = engine.launch("videotestsrc ! fakesink").unwrap();
        let err = pipeline.set_state(PipelineState::Playing).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::StateChange {
                state: PipelineState::Playing,
                ..
            }
        ));
    }

    #[test]
    fn test_no_element_lookup() {
        let engine = LaunchEngine::new();
        let pipeline = engine.launch("videotestsrc ! fakesink").unwrap();
        assert!(pipeline.element("moonlight_pay").is_none());
    }
}
