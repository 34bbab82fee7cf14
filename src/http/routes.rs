use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Configuration
        .route("/apps", get(handlers::list_apps))
        .route(
            "/clients",
            get(handlers::list_clients)
                .post(handlers::pair_client)
                .delete(handlers::unpair_client),
        )
        // Session control
        .route("/sessions", get(handlers::list_sessions))
        .route(
            "/sessions/:session_id/keyframe",
            post(handlers::force_keyframe),
        )
        .route(
            "/sessions/:session_id/terminate",
            post(handlers::terminate_session),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
