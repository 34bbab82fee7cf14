use super::state::AppState;
use crate::error::ConfigError;
use crate::events::{ControlEvent, ControlEventType, SessionId, TerminateEvent};
use crate::host::ActiveSession;
use crate::state::{App, Config, PairedClient};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AppRecord<'a> {
    pub id: &'a str,
    #[serde(flatten)]
    pub app: &'a App,
}

#[derive(Debug, Deserialize)]
pub struct PairRequest {
    pub client_cert: String,
    /// Defaults to 1000
    pub run_uid: Option<u32>,
    /// Defaults to 1000
    pub run_gid: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UnpairRequest {
    pub client_cert: String,
}

#[derive(Debug, Serialize)]
pub struct PairResponse {
    pub status: String,
    pub paired_clients: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionEventResponse {
    pub session_id: SessionId,
    pub status: String,
    /// Number of handlers the event reached
    pub delivered: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /apps
/// Exported record of every configured app
pub async fn list_apps(State(state): State<AppState>) -> impl IntoResponse {
    let apps: Vec<AppRecord> = state
        .config
        .apps
        .iter()
        .map(|app| AppRecord { id: &app.id, app })
        .collect();

    match serde_json::to_value(&apps) {
        Ok(apps) => (StatusCode::OK, Json(apps)).into_response(),
        Err(e) => {
            error!("Failed to export apps: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to export apps: {}", e),
            )
        }
    }
}

/// GET /clients
pub async fn list_clients(State(state): State<AppState>) -> impl IntoResponse {
    let clients = state.config.paired_clients.load();
    Json(clients.as_ref().clone())
}

/// Run a blocking config file mutation off the async workers
async fn update_config<F>(config: Arc<Config>, update: F) -> Result<(), String>
where
    F: FnOnce(&Config) -> Result<(), ConfigError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || update(&config)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(format!("config update task failed: {}", e)),
    }
}

/// POST /clients
/// Pair a client; re-pairing a certificate replaces its record
pub async fn pair_client(
    State(state): State<AppState>,
    Json(req): Json<PairRequest>,
) -> impl IntoResponse {
    let mut client = PairedClient::new(req.client_cert);
    if let Some(uid) = req.run_uid {
        client.run_uid = uid;
    }
    if let Some(gid) = req.run_gid {
        client.run_gid = gid;
    }

    info!("Pairing client (uid={}, gid={})", client.run_uid, client.run_gid);

    if let Err(e) = update_config(Arc::clone(&state.config), move |config| config.pair(&client)).await {
        // The in-memory list is already updated, only persistence failed.
        error!("Failed to persist paired client: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to persist paired client: {}", e),
        );
    }

    (
        StatusCode::OK,
        Json(PairResponse {
            status: "paired".to_string(),
            paired_clients: state.config.paired_clients.len(),
        }),
    )
        .into_response()
}

/// DELETE /clients
/// Unpair a client; unknown certificates are ignored
pub async fn unpair_client(
    State(state): State<AppState>,
    Json(req): Json<UnpairRequest>,
) -> impl IntoResponse {
    let client = PairedClient::new(req.client_cert);

    if let Err(e) = update_config(Arc::clone(&state.config), move |config| config.unpair(&client)).await {
        error!("Failed to persist unpaired client: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to persist unpaired client: {}", e),
        );
    }

    (
        StatusCode::OK,
        Json(PairResponse {
            status: "unpaired".to_string(),
            paired_clients: state.config.paired_clients.len(),
        }),
    )
        .into_response()
}

/// GET /sessions
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions: Vec<ActiveSession> = state.sessions.list();
    Json(sessions)
}

/// POST /sessions/:session_id/keyframe
/// Ask the session's video encoder for an immediate keyframe
pub async fn force_keyframe(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> impl IntoResponse {
    if !state.sessions.contains(session_id) {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        );
    }

    let delivered = state
        .bus
        .publish(ControlEvent::new(session_id, ControlEventType::IdrFrame));

    (
        StatusCode::OK,
        Json(SessionEventResponse {
            session_id,
            status: "keyframe_requested".to_string(),
            delivered,
        }),
    )
        .into_response()
}

/// POST /sessions/:session_id/terminate
/// Stop every pipeline and runner of a session
pub async fn terminate_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> impl IntoResponse {
    if !state.sessions.contains(session_id) {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        );
    }

    info!(session_id, "Terminating session");
    let delivered = state.bus.publish(TerminateEvent { session_id });

    (
        StatusCode::OK,
        Json(SessionEventResponse {
            session_id,
            status: "terminating".to_string(),
            delivered,
        }),
    )
        .into_response()
}
