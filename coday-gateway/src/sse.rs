//! `GET /events?clientId=<id>` — the SSE stream every session's events fan
//! out over (§4.9 *Stream fan-out*, §6 "SSE stream").

use crate::routes::ClientIdQuery;
use crate::state::AppState;
use axum::extract::Query;
use axum::extract::State;
use axum::response::sse::Event as SseEvent;
use axum::response::sse::KeepAlive;
use axum::response::Sse;
use coday_core::ThreadService;
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::warn;

/// `GET /events?clientId=<id>` (§6). Connects or resumes the session, then
/// streams every event published on its bus as one `data: <json>` frame
/// apiece — including the typed `Event::HeartBeat` the session itself pushes
/// every [`coday_core::runtime::HEARTBEAT_INTERVAL`] (§4.9). `axum`'s
/// [`KeepAlive`] is layered on top purely as transport-level insurance
/// against proxies closing an idle connection; it is not what satisfies the
/// spec's heartbeat requirement.
pub async fn events(
    State(state): State<AppState>,
    Query(query): Query<ClientIdQuery>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    // `ProjectSelected` (emitted once the client picks a project, out of
    // scope here) is what would normally swap this for a project-scoped
    // repository; until then every session's thread service is rooted at
    // a fixed default project.
    let thread_service = Arc::new(ThreadService::new(state.project_repository("_default")));
    let session = state.sessions.connect(&query.client_id, thread_service).await;
    let receiver = session.subscribe();

    let stream = BroadcastStream::new(receiver).filter_map(|item| match item {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(SseEvent::default().data(json))),
            Err(err) => {
                warn!(error = %err, "failed to serialize event for SSE");
                None
            }
        },
        Err(err) => {
            warn!(error = %err, "SSE subscriber lagged, dropping buffered events");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(10)))
}
