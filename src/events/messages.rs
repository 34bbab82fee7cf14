use serde::{Deserialize, Serialize};

/// Identifier shared by every stream belonging to one client session
pub type SessionId = u64;

/// Control stream requests forwarded to a running session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlEventType {
    /// Client lost frames and needs a new IDR (keyframe) to recover
    IdrFrame,
    /// Client reported frame loss statistics
    LossStats,
    /// Client reported an invalidated reference frame range
    InvalidateRefFrames,
    /// Anything the host does not act on
    Other,
}

/// Message received on a client's control stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEvent {
    pub session_id: SessionId,
    #[serde(rename = "type")]
    pub event_type: ControlEventType,
}

impl ControlEvent {
    pub fn new(session_id: SessionId, event_type: ControlEventType) -> Self {
        Self {
            session_id,
            event_type,
        }
    }
}

/// The client session ended, every pipeline and runner bound to it must stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminateEvent {
    pub session_id: SessionId,
}

/// Request to start an app's runner for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchAppEvent {
    pub session_id: SessionId,
    pub app_id: String,
}
