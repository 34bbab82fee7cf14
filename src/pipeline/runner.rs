use crate::error::PipelineError;
use crate::events::HandlerRegistration;
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::engine::{BusMessage, MediaEngine, MediaPipeline, PipelineState};

/// Why a pipeline's run loop returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The pipeline drained all its sources
    EndOfStream,
    /// An element posted an error
    Error(String),
    /// Someone asked the run loop to quit
    Terminated,
}

/// Blocking run loop of one pipeline
///
/// `run` parks the calling thread until the first exit request arrives.
/// `quit` may be called from any thread, before or during `run`.
pub struct MainLoop {
    tx: Sender<RunOutcome>,
    rx: Mutex<Receiver<RunOutcome>>,
}

impl MainLoop {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Ask the loop to stop; the runner still drains the pipeline afterwards
    pub fn quit(&self) {
        self.exit(RunOutcome::Terminated);
    }

    fn exit(&self, outcome: RunOutcome) {
        // Receiver lives as long as self, so this cannot fail.
        let _ = self.tx.send(outcome);
    }

    fn run(&self) -> RunOutcome {
        self.rx.lock().recv().unwrap_or(RunOutcome::Terminated)
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Build and run one pipeline until it errors, ends or is told to quit
///
/// `on_ready` is called once the pipeline is parsed and watched, before it
/// starts playing. The registrations it returns are owned by the runner and
/// are unregistered during teardown whatever the exit reason.
///
/// Returns `Err` only when the description cannot be turned into a watched
/// pipeline (a pipeline whose watch fails is set back to `Null` first); once
/// the pipeline was started the result is `Ok` with the exit reason.
pub fn run_pipeline<F>(
    engine: &dyn MediaEngine,
    description: &str,
    on_ready: F,
) -> Result<RunOutcome, PipelineError>
where
    F: FnOnce(Arc<dyn MediaPipeline>, Arc<MainLoop>) -> Vec<HandlerRegistration>,
{
    let pipeline = engine.launch(description).map_err(|e| {
        error!("[{}] Parse error: {}", engine.name(), e);
        e
    })?;

    let main_loop = Arc::new(MainLoop::new());

    let watch_loop = Arc::clone(&main_loop);
    let engine_name = engine.name().to_string();
    let watched = pipeline.add_watch(Box::new(move |message| match message {
        BusMessage::Error {
            source,
            message,
            debug: details,
        } => {
            error!(
                element = source.as_deref().unwrap_or("unknown"),
                debug = details.as_deref().unwrap_or(""),
                "[{}] Pipeline error: {}",
                engine_name,
                message
            );
            watch_loop.exit(RunOutcome::Error(message));
        }
        BusMessage::EndOfStream => watch_loop.exit(RunOutcome::EndOfStream),
    }));
    if let Err(e) = watched {
        error!("[{}] Failed to watch pipeline: {}", engine.name(), e);
        if let Err(e) = pipeline.set_state(PipelineState::Null) {
            warn!("[{}] Teardown: {}", engine.name(), e);
        }
        return Err(e);
    }

    let handlers = on_ready(Arc::clone(&pipeline), Arc::clone(&main_loop));

    let outcome = match pipeline.set_state(PipelineState::Playing) {
        Ok(()) => {
            debug!("[{}] Pipeline playing", engine.name());
            main_loop.run()
        }
        Err(e) => {
            error!("[{}] Failed to start pipeline: {}", engine.name(), e);
            RunOutcome::Error(e.to_string())
        }
    };

    info!("[{}] Pipeline stopped: {:?}", engine.name(), outcome);

    for state in [PipelineState::Paused, PipelineState::Ready, PipelineState::Null] {
        if let Err(e) = pipeline.set_state(state) {
            warn!("[{}] Teardown: {}", engine.name(), e);
        }
    }
    pipeline.remove_watch();

    for handler in handlers {
        handler.unregister();
    }

    Ok(outcome)
}
