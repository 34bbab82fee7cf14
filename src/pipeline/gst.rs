//! In-process GStreamer engine
//!
//! Pipelines are built with `gst_parse_launch` and watched through a bus
//! sync handler, so every session gets its own message stream without a
//! shared GLib main context. Forced keyframes are injected as custom
//! upstream events on the named payloader element.

use gstreamer as gst;
use gstreamer::prelude::*;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use super::engine::{
    BusMessage, MediaEngine, MediaPipeline, MessageWatch, PipelineElement, PipelineState,
    UpstreamEvent,
};
use crate::error::PipelineError;

static INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Handle proving GStreamer was initialized for this process
#[derive(Debug, Clone)]
pub struct GstEngine {
    _initialized: (),
}

impl GstEngine {
    /// Initialize GStreamer once per process
    ///
    /// Later calls return the result of the first initialization.
    pub fn init() -> Result<Self, PipelineError> {
        INIT.get_or_init(|| {
            gst::init().map_err(|e| e.to_string())?;
            info!("GStreamer {} initialized", gst::version_string());
            Ok(())
        })
        .clone()
        .map_err(PipelineError::EngineInit)?;

        Ok(Self { _initialized: () })
    }
}

impl MediaEngine for GstEngine {
    fn name(&self) -> &str {
        "GSTREAMER"
    }

    fn launch(&self, description: &str) -> Result<Arc<dyn MediaPipeline>, PipelineError> {
        let element =
            gst::parse::launch(description).map_err(|e| PipelineError::Parse(e.to_string()))?;

        let pipeline = match element.downcast::<gst::Pipeline>() {
            Ok(pipeline) => pipeline,
            Err(element) => {
                let pipeline = gst::Pipeline::new();
                pipeline
                    .add(&element)
                    .map_err(|e| PipelineError::Parse(e.to_string()))?;
                pipeline
            }
        };

        Ok(Arc::new(GstPipeline { pipeline }))
    }

    fn is_plugin_available(&self, plugin_name: &str) -> bool {
        gst::Registry::get().find_plugin(plugin_name).is_some()
    }
}

struct GstPipeline {
    pipeline: gst::Pipeline,
}

fn gst_state(state: PipelineState) -> gst::State {
    match state {
        PipelineState::Null => gst::State::Null,
        PipelineState::Ready => gst::State::Ready,
        PipelineState::Paused => gst::State::Paused,
        PipelineState::Playing => gst::State::Playing,
    }
}

impl MediaPipeline for GstPipeline {
    fn set_state(&self, state: PipelineState) -> Result<(), PipelineError> {
        self.pipeline
            .set_state(gst_state(state))
            .map(|_| ())
            .map_err(|e| PipelineError::StateChange {
                state,
                reason: e.to_string(),
            })
    }

    fn add_watch(&self, watch: MessageWatch) -> Result<(), PipelineError> {
        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| PipelineError::Engine("pipeline has no bus".to_string()))?;

        bus.set_sync_handler(move |_, message| {
            match message.view() {
                gst::MessageView::Error(err) => watch(BusMessage::Error {
                    source: err.src().map(|src| src.path_string().to_string()),
                    message: err.error().to_string(),
                    debug: err.debug().map(|d| d.to_string()),
                }),
                gst::MessageView::Eos(_) => watch(BusMessage::EndOfStream),
                _ => {}
            }
            // Nobody pops the bus queue, everything is handled right here.
            gst::BusSyncReply::Drop
        });
        Ok(())
    }

    fn remove_watch(&self) {
        if let Some(bus) = self.pipeline.bus() {
            bus.unset_sync_handler();
        }
    }

    fn element(&self, name: &str) -> Option<Box<dyn PipelineElement>> {
        self.pipeline.by_name(name).map(|element| {
            Box::new(GstElement {
                name: name.to_string(),
                element,
            }) as Box<dyn PipelineElement>
        })
    }
}

struct GstElement {
    name: String,
    element: gst::Element,
}

impl PipelineElement for GstElement {
    fn name(&self) -> &str {
        &self.name
    }

    fn send_event(&self, event: UpstreamEvent) -> bool {
        match event {
            UpstreamEvent::ForceKeyUnit { all_headers } => {
                let structure = gst::Structure::builder("GstForceKeyUnit")
                    .field("all-headers", all_headers)
                    .build();
                debug!("Sending GstForceKeyUnit to {}", self.name);
                self.element
                    .send_event(gst::event::CustomUpstream::new(structure))
            }
        }
    }
}
