//! Durable, name-addressable thread storage (§4.3).

mod file_backend;
mod sanitize;

pub use file_backend::FileThreadRepository;
pub use sanitize::sanitize_name;

use crate::error::Result;
use crate::thread::AiThread;
use crate::thread::ThreadSummary;
use async_trait::async_trait;
use coday_protocol::ThreadId;

/// Storage-agnostic contract the thread service builds on (§4.3).
#[async_trait]
pub trait ThreadRepository: Send + Sync {
    async fn get_by_id(&self, id: ThreadId) -> Result<Option<AiThread>>;

    /// Persist `thread`. If the thread's name changed since it was last
    /// saved, a new file is written and the previous file is **not**
    /// deleted (§4.3 rename semantics) — callers wanting a true rename must
    /// `delete` the old id first.
    async fn save(&self, thread: &AiThread) -> Result<()>;

    /// Summaries of every thread, sorted by `modified_date` descending.
    /// Entries that fail to parse are silently skipped (corruption
    /// tolerance, §4.3).
    async fn list_threads(&self) -> Result<Vec<ThreadSummary>>;

    async fn delete(&self, id: ThreadId) -> Result<bool>;

    /// Convenience wrapper over `getById`/`save`: load, rename, persist. The
    /// old file is still left in place, per `save`'s rename semantics — this
    /// only saves callers the round trip of doing it by hand.
    async fn rename(&self, id: ThreadId, new_name: String) -> Result<Option<AiThread>> {
        let Some(mut thread) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        thread.name = new_name;
        self.save(&thread).await?;
        Ok(Some(thread))
    }
}
