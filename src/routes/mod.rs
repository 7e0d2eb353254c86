//! HTTP route table.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers::{health_check, incoming_call, media_stream_handler};
use crate::state::AppState;

/// Build the application router.
///
/// Twilio issues the voice webhook as a POST by default but can be
/// configured for GET, so `/incoming-call` accepts both.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/incoming-call", get(incoming_call).post(incoming_call))
        .route("/media-stream", get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
