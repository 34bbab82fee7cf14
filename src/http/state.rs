use crate::events::EventBus;
use crate::host::ActiveSessions;
use crate::state::Config;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Control events are published here, as the control stream would
    pub bus: EventBus,
    pub sessions: ActiveSessions,
}

impl AppState {
    pub fn new(config: Arc<Config>, bus: EventBus, sessions: ActiveSessions) -> Self {
        Self {
            config,
            bus,
            sessions,
        }
    }
}
