//! Thread service: select/save/delete the session's active thread, with
//! fire-and-forget post-save hooks as extension points for summarisation and
//! memory extraction (§4.8).

use crate::error::CodayError;
use crate::error::Result;
use crate::repository::ThreadRepository;
use crate::thread::AiThread;
use crate::util::now_rfc3339;
use coday_protocol::Event;
use coday_protocol::ThreadId;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tracing::warn;

/// Name given to a thread synthesised by `select(None)` when no thread
/// exists yet (§4.8).
const NEW_THREAD_NAME: &str = "New Thread";

/// Fire-and-forget hook run after every successful `save()` (§4.8: "trigger
/// post-run hooks — summarisation call using SMALL model, memory extraction
/// — as fire-and-forget extension points"). Hooks never block `save()` and
/// their failures are logged, not propagated.
pub type PostSaveHook = Arc<dyn Fn(AiThread) + Send + Sync>;

/// Owns the single "active thread" for one session (§4.8, §3 `Session`).
pub struct ThreadService {
    repository: Arc<dyn ThreadRepository>,
    active: RwLock<Option<AiThread>>,
    post_save_hooks: Vec<PostSaveHook>,
}

impl ThreadService {
    pub fn new(repository: Arc<dyn ThreadRepository>) -> Self {
        Self {
            repository,
            active: RwLock::new(None),
            post_save_hooks: Vec::new(),
        }
    }

    pub fn with_post_save_hook(mut self, hook: PostSaveHook) -> Self {
        self.post_save_hooks.push(hook);
        self
    }

    /// Select the active thread (§4.8): load `id` if given, else resume the
    /// most-recently-modified thread, else synthesise and persist a new
    /// one. Returns the `ThreadSelected` event to publish on the session bus.
    pub async fn select(&self, id: Option<ThreadId>) -> Result<Event> {
        let thread = match id {
            Some(id) => self
                .repository
                .get_by_id(id)
                .await?
                .ok_or(CodayError::ThreadNotFound(id))?,
            None => match self.most_recent().await? {
                Some(thread) => thread,
                None => {
                    let thread = AiThread::new(NEW_THREAD_NAME);
                    self.repository.save(&thread).await?;
                    thread
                }
            },
        };

        let event = Event::ThreadSelected {
            timestamp: now_rfc3339(),
            parent_key: None,
            thread_name: thread.name.clone(),
        };
        *self.active.write().await = Some(thread);
        Ok(event)
    }

    async fn most_recent(&self) -> Result<Option<AiThread>> {
        let summaries = self.repository.list_threads().await?;
        match summaries.first() {
            Some(summary) => self.repository.get_by_id(summary.id).await,
            None => Ok(None),
        }
    }

    /// A clone of the current active thread, if one has been selected.
    pub async fn active(&self) -> Option<AiThread> {
        self.active.read().await.clone()
    }

    /// Replace the active thread in place (used by the runtime after it
    /// appends events, since the runtime holds its own shared handle — see
    /// `crate::runtime`).
    pub async fn set_active(&self, thread: AiThread) {
        *self.active.write().await = Some(thread);
    }

    /// Persist the active thread and fire post-save hooks (§4.8).
    pub async fn save(&self) -> Result<()> {
        let thread = {
            let guard = self.active.read().await;
            guard.clone()
        };
        let Some(thread) = thread else {
            return Ok(());
        };

        self.repository.save(&thread).await?;
        info!(thread_id = %thread.id, "saved thread");

        for hook in &self.post_save_hooks {
            let hook = hook.clone();
            let thread = thread.clone();
            tokio::spawn(async move {
                hook(thread);
            });
        }

        Ok(())
    }

    /// Delete a thread; if it was active, clear the active slot (§4.8).
    pub async fn delete(&self, id: ThreadId) -> Result<bool> {
        let deleted = self.repository.delete(id).await?;
        if deleted {
            let mut active = self.active.write().await;
            if active.as_ref().is_some_and(|thread| thread.id == id) {
                *active = None;
            }
        } else {
            warn!(thread_id = %id, "delete requested for unknown thread");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::repository::FileThreadRepository;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;

    fn repo() -> Arc<dyn ThreadRepository> {
        let dir = tempdir().expect("tempdir");
        Arc::new(FileThreadRepository::new(dir.keep()))
    }

    #[tokio::test]
    async fn select_none_synthesises_new_thread_when_empty() {
        let service = ThreadService::new(repo());
        let event = service.select(None).await.expect("select");
        let Event::ThreadSelected { thread_name, .. } = event else {
            panic!("expected ThreadSelected");
        };
        assert_eq!(thread_name, NEW_THREAD_NAME);
        assert!(service.active().await.is_some());
    }

    #[tokio::test]
    async fn select_by_id_surfaces_not_found() {
        let service = ThreadService::new(repo());
        let err = service.select(Some(ThreadId::new())).await.unwrap_err();
        assert!(matches!(err, CodayError::ThreadNotFound(_)));
    }

    #[tokio::test]
    async fn save_runs_post_save_hooks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let hook_calls = calls.clone();
        let service = ThreadService::new(repo())
            .with_post_save_hook(Arc::new(move |_thread| {
                hook_calls.fetch_add(1, Ordering::SeqCst);
            }));

        service.select(None).await.expect("select");
        service.save().await.expect("save");

        // hooks are fire-and-forget; give the spawned task a chance to run
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delete_clears_active_slot_only_when_active() {
        let service = ThreadService::new(repo());
        service.select(None).await.expect("select");
        let id = service.active().await.expect("active").id;

        assert!(service.delete(id).await.expect("delete"));
        assert!(service.active().await.is_none());
    }
}
