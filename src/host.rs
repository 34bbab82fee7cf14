//! Process-lifetime wiring between the event bus and the session workers
//!
//! The control component publishes a `VideoSession`, an `AudioSession` or a
//! `LaunchAppEvent` when a client starts streaming. `Host::install` turns
//! those into a dedicated pipeline thread or a runner task, and records each
//! of them in `ActiveSessions` until it stops.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use crate::events::{EventBus, HandlerRegistration, LaunchAppEvent, SessionId};
use crate::pipeline::{MediaEngine, RunOutcome};
use crate::runners::TerminateSignal;
use crate::state::{AudioSession, Config, VideoSession};
use crate::streaming::{start_streaming_audio, start_streaming_video};

/// What a tracked worker does for its session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Video,
    Audio,
    App,
}

/// A worker currently running for a client session
#[derive(Debug, Clone, Serialize)]
pub struct ActiveSession {
    pub session_id: SessionId,
    pub kind: SessionKind,
    /// Client address for streams, app title for runners
    pub target: String,
    pub started_at: DateTime<Utc>,
}

/// Registry of running session workers, shared with the HTTP API
#[derive(Debug, Clone, Default)]
pub struct ActiveSessions {
    inner: Arc<Mutex<BTreeMap<(SessionId, SessionKind), ActiveSession>>>,
}

impl ActiveSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a worker; returns `false` and keeps the existing record when
    /// one of the same kind is already running for the session
    pub fn insert(
        &self,
        session_id: SessionId,
        kind: SessionKind,
        target: impl Into<String>,
    ) -> bool {
        match self.inner.lock().entry((session_id, kind)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(ActiveSession {
                    session_id,
                    kind,
                    target: target.into(),
                    started_at: Utc::now(),
                });
                true
            }
        }
    }

    pub fn remove(&self, session_id: SessionId, kind: SessionKind) -> Option<ActiveSession> {
        self.inner.lock().remove(&(session_id, kind))
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.inner.lock().keys().any(|(id, _)| *id == session_id)
    }

    /// Ordered by session id, then kind
    pub fn list(&self) -> Vec<ActiveSession> {
        self.inner.lock().values().cloned().collect()
    }

    /// Distinct ids of every session with at least one running worker
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.inner.lock().keys().map(|(id, _)| *id).collect();
        ids.dedup();
        ids
    }
}

/// Starts session workers in response to bus events
pub struct Host {
    config: Arc<Config>,
    bus: EventBus,
    engine: Arc<dyn MediaEngine>,
    sessions: ActiveSessions,
    runtime: Handle,
}

impl Host {
    pub fn new(
        config: Arc<Config>,
        bus: EventBus,
        engine: Arc<dyn MediaEngine>,
        runtime: Handle,
    ) -> Self {
        Self {
            config,
            bus,
            engine,
            sessions: ActiveSessions::new(),
            runtime,
        }
    }

    pub fn sessions(&self) -> &ActiveSessions {
        &self.sessions
    }

    /// Subscribe the session starters; they stay active until the returned
    /// registrations are dropped
    pub fn install(&self) -> Vec<HandlerRegistration> {
        let video = {
            let engine = Arc::clone(&self.engine);
            let sessions = self.sessions.clone();
            self.bus.register_handler(move |session: &VideoSession| {
                spawn_video(session.clone(), Arc::clone(&engine), sessions.clone());
            })
        };

        let audio = {
            let engine = Arc::clone(&self.engine);
            let sessions = self.sessions.clone();
            self.bus.register_handler(move |session: &AudioSession| {
                spawn_audio(session.clone(), Arc::clone(&engine), sessions.clone());
            })
        };

        let apps = {
            let config = Arc::clone(&self.config);
            let bus = self.bus.clone();
            let sessions = self.sessions.clone();
            let runtime = self.runtime.clone();
            self.bus.register_handler(move |event: &LaunchAppEvent| {
                launch_app(event, &config, &bus, &sessions, &runtime);
            })
        };

        info!("Host handlers installed");
        vec![video, audio, apps]
    }
}

fn log_outcome(session_id: SessionId, kind: SessionKind, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Error(message) => {
            warn!(session_id, "{:?} stream stopped on error: {}", kind, message)
        }
        other => info!(session_id, "{:?} stream stopped: {:?}", kind, other),
    }
}

fn spawn_video(session: VideoSession, engine: Arc<dyn MediaEngine>, sessions: ActiveSessions) {
    let session_id = session.session_id;
    if !sessions.insert(session_id, SessionKind::Video, session.client_ip.clone()) {
        warn!(session_id, "Video stream already running, ignoring start");
        return;
    }

    let worker = sessions.clone();
    let spawned = thread::Builder::new()
        .name(format!("video-{}", session_id))
        .spawn(move || {
            // The client streams back to the port it was handed in the
            // session setup.
            match start_streaming_video(&session, session.port, engine.as_ref()) {
                Ok(outcome) => log_outcome(session_id, SessionKind::Video, &outcome),
                Err(e) => error!(session_id, "Unable to start video stream: {}", e),
            }
            worker.remove(session_id, SessionKind::Video);
        });

    if let Err(e) = spawned {
        error!(session_id, "Failed to spawn video thread: {}", e);
        sessions.remove(session_id, SessionKind::Video);
    }
}

fn spawn_audio(session: AudioSession, engine: Arc<dyn MediaEngine>, sessions: ActiveSessions) {
    let session_id = session.session_id;
    if !sessions.insert(session_id, SessionKind::Audio, session.client_ip.clone()) {
        warn!(session_id, "Audio stream already running, ignoring start");
        return;
    }

    let worker = sessions.clone();
    let spawned = thread::Builder::new()
        .name(format!("audio-{}", session_id))
        .spawn(move || {
            match start_streaming_audio(&session, session.port, engine.as_ref()) {
                Ok(outcome) => log_outcome(session_id, SessionKind::Audio, &outcome),
                Err(e) => error!(session_id, "Unable to start audio stream: {}", e),
            }
            worker.remove(session_id, SessionKind::Audio);
        });

    if let Err(e) = spawned {
        error!(session_id, "Failed to spawn audio thread: {}", e);
        sessions.remove(session_id, SessionKind::Audio);
    }
}

fn launch_app(
    event: &LaunchAppEvent,
    config: &Config,
    bus: &EventBus,
    sessions: &ActiveSessions,
    runtime: &Handle,
) {
    let session_id = event.session_id;
    let Some(app) = config.find_app(&event.app_id) else {
        warn!(session_id, "Unknown app id {}, nothing to launch", event.app_id);
        return;
    };

    if !sessions.insert(session_id, SessionKind::App, app.title.clone()) {
        warn!(session_id, "An app is already running, ignoring launch of {}", app.title);
        return;
    }
    info!(session_id, "Launching app: {}", app.title);

    // Armed here so a terminate published before the task is polled still
    // reaches the runner.
    let terminate = TerminateSignal::subscribe(session_id, bus);
    let runner = Arc::clone(&app.runner);
    let title = app.title.clone();
    let sessions = sessions.clone();
    runtime.spawn(async move {
        match runner.run_until(terminate).await {
            Ok(()) => info!(session_id, "App {} stopped", title),
            Err(e) => warn!(session_id, "App {} failed: {}", title, e),
        }
        sessions.remove(session_id, SessionKind::App);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_sessions_track_kinds_separately() {
        let sessions = ActiveSessions::new();
        sessions.insert(7, SessionKind::Video, "10.0.0.2");
        sessions.insert(7, SessionKind::Audio, "10.0.0.2");
        sessions.insert(3, SessionKind::App, "Desktop");

        let listed: Vec<_> = sessions.list().iter().map(|s| (s.session_id, s.kind)).collect();
        assert_eq!(
            listed,
            vec![(3, SessionKind::App), (7, SessionKind::Video), (7, SessionKind::Audio)]
        );
        assert_eq!(sessions.session_ids(), vec![3, 7]);

        sessions.remove(7, SessionKind::Video);
        assert!(sessions.contains(7));
        sessions.remove(7, SessionKind::Audio);
        assert!(!sessions.contains(7));
    }

    #[test]
    fn test_duplicate_start_keeps_first_record() {
        let sessions = ActiveSessions::new();
        assert!(sessions.insert(7, SessionKind::Video, "10.0.0.2"));
        assert!(!sessions.insert(7, SessionKind::Video, "10.0.0.3"));

        let listed = sessions.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].target, "10.0.0.2");

        // The first worker's exit frees the slot for a new start.
        sessions.remove(7, SessionKind::Video);
        assert!(sessions.insert(7, SessionKind::Video, "10.0.0.3"));
    }

    #[test]
    fn test_remove_unknown_session() {
        let sessions = ActiveSessions::new();
        assert!(sessions.remove(1, SessionKind::Video).is_none());
        assert!(sessions.list().is_empty());
    }
}
