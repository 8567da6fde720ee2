//! Session gateway: SSE event fan-out, answer/stop ingress, resumable
//! sessions with idle expiry, and the thread REST wrapper (§4.9, §6).

pub mod error;
pub mod routes;
pub mod session;
pub mod sse;
pub mod state;

pub use error::GatewayError;
pub use session::Session;
pub use session::SessionManager;
pub use state::AppState;

use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use axum::Router;

/// Build the gateway's router over `state` (§6 endpoint list).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events", get(sse::events))
        .route("/api/message", post(routes::post_message))
        .route("/api/stop", post(routes::post_stop))
        .route(
            "/api/projects/{project}/threads",
            get(routes::list_threads).post(routes::create_thread),
        )
        .route(
            "/api/projects/{project}/threads/{id}",
            get(routes::get_thread)
                .put(routes::rename_thread)
                .delete(routes::delete_thread),
        )
        .with_state(state)
}
