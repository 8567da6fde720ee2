//! Answer/stop ingress and the thread REST wrapper (§6).

use crate::error::GatewayError;
use crate::state::AppState;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::Json;
use coday_core::repository::ThreadRepository;
use coday_core::ThreadSummary;
use coday_protocol::ThreadId;
use serde::Deserialize;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_stream::StreamExt;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct ClientIdQuery {
    #[serde(rename = "clientId")]
    pub client_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub answer: String,
    #[serde(default, rename = "parentKey")]
    pub parent_key: Option<String>,
}

/// `POST /api/message?clientId=<id>` (§6 *Answer ingress*, §4.9 data flow:
/// "a user answer enters the gateway, is appended to the AiThread, and
/// triggers the AiClient runtime for the selected agent"). The answer is
/// appended and acknowledged synchronously; the run itself is driven on a
/// detached task so every event it produces streams over the session's SSE
/// bus as it happens, rather than waiting for the whole run to finish.
pub async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<ClientIdQuery>,
    Json(body): Json<MessageBody>,
) -> Result<(), GatewayError> {
    if body.answer.is_empty() {
        return Err(GatewayError::BadRequest("answer must not be empty".to_string()));
    }

    let session = state
        .sessions
        .get(&query.client_id)
        .await
        .ok_or_else(|| GatewayError::SessionNotFound(query.client_id.clone()))?;

    if session.thread_service.active().await.is_none() {
        let selected = session.thread_service.select(None).await?;
        session.publish(selected);
    }
    let mut thread = session
        .thread_service
        .active()
        .await
        .unwrap_or_else(|| unreachable!("thread was just selected"));
    let message = thread.add_user_message(query.client_id.clone(), body.answer);
    session.publish(message);

    let thread = Arc::new(RwLock::new(thread));
    let agent = (*state.default_agent).clone();
    let control = session.control.clone();
    let mut events = state.runtime.run(agent, thread.clone(), control);

    let thread_service = session.thread_service.clone();
    let run_session = session.clone();
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            run_session.publish(event);
        }
        let finished = thread.read().await.clone();
        thread_service.set_active(finished).await;
        if let Err(err) = thread_service.save().await {
            warn!(error = %err, "failed to persist thread after run");
        }
    });

    Ok(())
}

/// `POST /api/stop?clientId=<id>` (§6 *Stop ingress*).
pub async fn post_stop(
    State(state): State<AppState>,
    Query(query): Query<ClientIdQuery>,
) -> Result<(), GatewayError> {
    let session = state
        .sessions
        .get(&query.client_id)
        .await
        .ok_or_else(|| GatewayError::SessionNotFound(query.client_id.clone()))?;

    if session.control.status() == coday_core::runtime::RunStatus::Idle {
        return Err(GatewayError::NoActiveRun(query.client_id));
    }
    session.control.stop();
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ThreadsResponse {
    pub threads: Vec<ThreadSummary>,
}

/// `GET /api/projects/{project}/threads`.
pub async fn list_threads(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> Result<Json<ThreadsResponse>, GatewayError> {
    let repo = state.project_repository(&project);
    let threads = repo.list_threads().await?;
    Ok(Json(ThreadsResponse { threads }))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateThreadBody {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateThreadResponse {
    pub success: bool,
    pub thread: ThreadSummary,
}

/// `POST /api/projects/{project}/threads`.
pub async fn create_thread(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(body): Json<CreateThreadBody>,
) -> Result<Json<CreateThreadResponse>, GatewayError> {
    let repo = state.project_repository(&project);
    let thread = coday_core::AiThread::new(body.name.unwrap_or_else(|| "New Thread".to_string()));
    repo.save(&thread).await?;
    Ok(Json(CreateThreadResponse {
        success: true,
        thread: ThreadSummary::from(&thread),
    }))
}

#[derive(Debug, Serialize)]
pub struct ThreadDetail {
    #[serde(flatten)]
    pub summary: ThreadSummary,
    #[serde(rename = "messageCount")]
    pub message_count: usize,
    pub price: f64,
}

/// `GET /api/projects/{project}/threads/{id}`.
pub async fn get_thread(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
) -> Result<Json<ThreadDetail>, GatewayError> {
    let id = parse_thread_id(&id)?;
    let repo = state.project_repository(&project);
    let thread = repo
        .get_by_id(id)
        .await?
        .ok_or(coday_core::CodayError::ThreadNotFound(id))?;

    Ok(Json(ThreadDetail {
        message_count: thread.messages().len(),
        price: thread.price_usd,
        summary: ThreadSummary::from(&thread),
    }))
}

#[derive(Debug, Deserialize)]
pub struct RenameThreadBody {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateThreadResponse {
    pub success: bool,
    pub thread: ThreadSummary,
}

/// `PUT /api/projects/{project}/threads/{id}`.
pub async fn rename_thread(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
    Json(body): Json<RenameThreadBody>,
) -> Result<Json<UpdateThreadResponse>, GatewayError> {
    let id = parse_thread_id(&id)?;
    let repo = state.project_repository(&project);
    let thread = repo
        .rename(id, body.name)
        .await?
        .ok_or(coday_core::CodayError::ThreadNotFound(id))?;

    Ok(Json(UpdateThreadResponse {
        success: true,
        thread: ThreadSummary::from(&thread),
    }))
}

#[derive(Debug, Serialize)]
pub struct DeleteThreadResponse {
    pub success: bool,
    pub message: String,
}

/// `DELETE /api/projects/{project}/threads/{id}`.
pub async fn delete_thread(
    State(state): State<AppState>,
    Path((project, id)): Path<(String, String)>,
) -> Result<Json<DeleteThreadResponse>, GatewayError> {
    let thread_id = parse_thread_id(&id)?;
    let repo = state.project_repository(&project);
    let deleted = repo.delete(thread_id).await?;
    if !deleted {
        warn!(project, id, "delete requested for unknown thread");
    }
    Ok(Json(DeleteThreadResponse {
        success: deleted,
        message: if deleted {
            "deleted".to_string()
        } else {
            "not found".to_string()
        },
    }))
}

fn parse_thread_id(raw: &str) -> Result<ThreadId, GatewayError> {
    ThreadId::from_str(raw).map_err(|_| GatewayError::BadRequest(format!("invalid thread id: {raw}")))
}
