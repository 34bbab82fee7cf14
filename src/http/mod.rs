//! HTTP admin API for inspecting and controlling the host
//!
//! - GET /health - Health check
//! - GET /apps - Configured apps
//! - GET /clients - Paired clients
//! - POST /clients - Pair a client
//! - DELETE /clients - Unpair a client
//! - GET /sessions - Running session workers
//! - POST /sessions/:session_id/keyframe - Force a keyframe
//! - POST /sessions/:session_id/terminate - End a session

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
