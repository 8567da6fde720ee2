//! Shared application state threaded through every axum handler.

use crate::session::SessionManager;
use coday_core::repository::FileThreadRepository;
use coday_core::repository::ThreadRepository;
use coday_core::runtime::Agent;
use coday_core::runtime::AiClientRuntime;
use std::path::PathBuf;
use std::sync::Arc;

/// Cloned into every handler (axum requires `State` to be `Clone`); every
/// field is itself an `Arc`, so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub runtime: Arc<AiClientRuntime>,
    /// The persona every session's answer ingress drives the runtime with.
    /// Selecting *which* agent answers a given thread is out of scope here
    /// (no endpoint for it exists in the thread REST surface) — one gateway
    /// process speaks as one agent, configured at startup.
    pub default_agent: Arc<Agent>,
    projects_root: PathBuf,
}

impl AppState {
    pub fn new(projects_root: PathBuf, runtime: Arc<AiClientRuntime>, default_agent: Agent) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new()),
            runtime,
            default_agent: Arc::new(default_agent),
            projects_root,
        }
    }

    /// One [`FileThreadRepository`] per project, rooted at
    /// `<projectsRoot>/<project>/threads` — threads from different projects
    /// never share a directory (§6 thread REST is scoped by `{project}`).
    pub fn project_repository(&self, project: &str) -> Arc<dyn ThreadRepository> {
        Arc::new(FileThreadRepository::new(
            self.projects_root.join(project).join("threads"),
        ))
    }
}
