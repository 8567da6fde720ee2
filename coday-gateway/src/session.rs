//! Per-client session lifecycle: resumable SSE bindings with idle expiry
//! (§4.9, §5 "Session idle expiry").

use coday_core::runtime::RunControl;
use coday_core::runtime::Ticker;
use coday_core::runtime::HEARTBEAT_INTERVAL;
use coday_core::now_rfc3339;
use coday_core::ThreadService;
use coday_protocol::Event;
use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::info;

/// Default time a disconnected session is kept alive before teardown (§4.9).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(3600);

/// Depth of the per-session broadcast channel; a slow subscriber drops
/// frames rather than back-pressuring the agent loop.
const EVENT_BUS_CAPACITY: usize = 256;

/// A live, resumable binding between a `clientId` and a thread-in-progress
/// (§3 `Session`, glossary). Owns the event bus every SSE connection
/// subscribes to and the [`RunControl`] the active agent loop observes.
pub struct Session {
    pub client_id: String,
    pub thread_service: Arc<ThreadService>,
    pub control: RunControl,
    bus: broadcast::Sender<Event>,
    /// Bumped on every connect/disconnect; a pending termination task only
    /// tears the session down if this has not moved since it was scheduled,
    /// which is how a reconnect cancels a pending termination without any
    /// extra channel plumbing.
    revision: AtomicU64,
    /// Pushes `Event::HeartBeat` onto `bus` every [`HEARTBEAT_INTERVAL`] for
    /// as long as the session is alive (§4.9, §6 "SSE stream"); aborted on
    /// drop so it never outlives the session.
    heartbeat: JoinHandle<()>,
}

impl Session {
    fn new(client_id: String, thread_service: Arc<ThreadService>) -> Self {
        let (bus, _rx) = broadcast::channel(EVENT_BUS_CAPACITY);
        let heartbeat = tokio::spawn(heartbeat_loop(bus.clone()));
        Self {
            client_id,
            thread_service,
            control: RunControl::new(),
            bus,
            revision: AtomicU64::new(0),
            heartbeat,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Publish one event to every current subscriber. Silently drops the
    /// event if nobody is listening (§4.9 ordering note: fan-out is
    /// best-effort per subscriber, not a durable log).
    pub fn publish(&self, event: Event) {
        let _ = self.bus.send(event);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.heartbeat.abort();
    }
}

async fn heartbeat_loop(bus: broadcast::Sender<Event>) {
    let mut ticker = Ticker::new(HEARTBEAT_INTERVAL);
    loop {
        ticker.tick().await;
        let _ = bus.send(Event::HeartBeat {
            timestamp: now_rfc3339(),
            parent_key: None,
        });
    }
}

/// Process-global registry of live sessions, keyed by `clientId` (§4.9, §5
/// "process-wide singletons ... document their init/teardown").
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
    idle_timeout: Duration,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Resume the session for `client_id` if one is pending termination, or
    /// create a fresh one (§4.9 *Connect*). `thread_service` is only used
    /// when a new session is created.
    pub async fn connect(&self, client_id: &str, thread_service: Arc<ThreadService>) -> Arc<Session> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(client_id) {
            session.revision.fetch_add(1, Ordering::SeqCst);
            info!(client_id, "resumed session, cancelling pending termination");
            return session.clone();
        }

        let session = Arc::new(Session::new(client_id.to_string(), thread_service));
        sessions.insert(client_id.to_string(), session.clone());
        info!(client_id, "created new session");
        session
    }

    pub async fn get(&self, client_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(client_id).cloned()
    }

    /// Pause the agent loop and schedule termination after the idle timeout
    /// (§4.9 *Disconnect*). A subsequent `connect()` for the same client
    /// invalidates the schedule by bumping the session's revision.
    pub async fn disconnect(&self, client_id: &str) {
        let Some(session) = self.get(client_id).await else {
            return;
        };
        session.control.stop();

        let revision = session.revision.fetch_add(1, Ordering::SeqCst) + 1;
        let sessions = self.sessions.clone();
        let client_id = client_id.to_string();
        let idle_timeout = self.idle_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(idle_timeout).await;
            let mut sessions = sessions.write().await;
            if let Some(session) = sessions.get(&client_id) {
                if session.revision.load(Ordering::SeqCst) == revision {
                    sessions.remove(&client_id);
                    info!(client_id, "terminated idle session");
                }
            }
        });
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
