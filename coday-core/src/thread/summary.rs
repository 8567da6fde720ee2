use chrono::DateTime;
use chrono::Utc;
use coday_protocol::ThreadId;
use serde::Deserialize;
use serde::Serialize;

use super::AiThread;

/// Lightweight projection of an [`AiThread`] returned by `listThreads` (§4.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: ThreadId,
    pub name: String,
    pub summary: String,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
}

impl From<&AiThread> for ThreadSummary {
    fn from(thread: &AiThread) -> Self {
        Self {
            id: thread.id,
            name: thread.name.clone(),
            summary: thread.summary.clone(),
            created_date: thread.created_date,
            modified_date: thread.modified_date,
        }
    }
}
