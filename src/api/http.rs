//! HTTP server setup with Axum

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::rest::messages;
use super::state::AppState;

/// Largest accepted message payload
pub const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Create the Axum router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // REST API endpoints
        .route(
            "/api/v1/:game/messages",
            get(messages::get_messages).post(messages::post_message),
        )
        .layer(DefaultBodyLimit::max(MAX_PAYLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
