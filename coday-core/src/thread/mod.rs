//! The event-log conversation model (§3, §4.2 of the spec): an ordered,
//! deduplicating log of [`Event`]s plus the thread-level metadata the
//! repository and runtime need.

mod clock;
mod summary;

pub use summary::ThreadSummary;

use chrono::DateTime;
use chrono::Utc;
use coday_protocol::Event;
use coday_protocol::Role;
use coday_protocol::ThreadId;
use serde::Deserialize;
use serde::Serialize;

use self::clock::MonotonicClock;

/// A tool call requested by the model, prior to validation (§4.2).
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub args: String,
}

/// The result of running a tool, prior to being appended to the thread.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub id: String,
    pub response: String,
}

/// Ordered, deduplicating log of conversational events for one conversation
/// (§3). `messages` only ever holds the conversational subset
/// (`Message`/`ToolRequest`/`ToolResponse`) — every other [`Event`] variant is
/// transient and travels over the session bus without being persisted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiThread {
    pub id: ThreadId,
    pub name: String,
    pub summary: String,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
    /// Running cost in USD billed against this thread so far (§4.7 *Cost
    /// accounting*; surfaced as `price` on the Thread REST detail route,
    /// §6). Absent in threads persisted before this field existed.
    #[serde(default)]
    pub price_usd: f64,
    messages: Vec<Event>,

    #[serde(skip)]
    clock: MonotonicClock,
}

impl AiThread {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ThreadId::new(),
            name: name.into(),
            summary: String::new(),
            created_date: now,
            modified_date: now,
            price_usd: 0.0,
            messages: Vec::new(),
            clock: MonotonicClock::default(),
        }
    }

    pub fn messages(&self) -> &[Event] {
        &self.messages
    }

    /// Add an incremental cost recorded by the runtime for one provider call
    /// (§4.7 *Cost accounting*).
    pub fn record_cost(&mut self, usd: f64) {
        self.price_usd += usd;
        self.touch();
    }

    fn touch(&mut self) {
        self.modified_date = Utc::now();
    }

    fn stamp(&mut self) -> String {
        self.clock.next()
    }

    /// Append a `Message{role: user}` event (§4.2).
    pub fn add_user_message(&mut self, name: impl Into<String>, content: impl Into<String>) -> Event {
        self.push_message(Role::User, name, content)
    }

    /// Append a `Message{role: assistant}` event (§4.2).
    pub fn add_agent_message(&mut self, name: impl Into<String>, content: impl Into<String>) -> Event {
        self.push_message(Role::Assistant, name, content)
    }

    fn push_message(&mut self, role: Role, name: impl Into<String>, content: impl Into<String>) -> Event {
        let timestamp = self.stamp();
        let event = Event::Message {
            timestamp,
            parent_key: None,
            role,
            content: content.into(),
            name: name.into(),
        };
        self.messages.push(event.clone());
        self.touch();
        event
    }

    /// Append one `ToolRequest` per call with all three fields non-empty;
    /// calls missing a field are silently skipped (the model may produce
    /// partial tool blocks on truncation) (§4.2).
    pub fn add_tool_calls(&mut self, calls: &[ToolCallRequest]) -> Vec<Event> {
        let mut appended = Vec::new();
        for call in calls {
            if call.id.is_empty() || call.name.is_empty() || call.args.is_empty() {
                continue;
            }
            let timestamp = self.stamp();
            let event = Event::ToolRequest {
                timestamp,
                parent_key: None,
                tool_request_id: call.id.clone(),
                name: call.name.clone(),
                args: call.args.clone(),
            };
            self.messages.push(event.clone());
            appended.push(event);
        }
        if !appended.is_empty() {
            self.touch();
        }
        appended
    }

    /// Append `ToolResponse`s, applying the dedup rule (§3 invariant 3,
    /// §4.2, §8 *Dedup*): for each response whose request exists and whose
    /// id/response are both non-empty, every prior `(name, args)`-identical
    /// `ToolRequest`/`ToolResponse` pair (under a different request id) is
    /// removed before the fresh pair is appended.
    pub fn add_tool_responses(&mut self, results: &[ToolCallResult]) -> Vec<Event> {
        let mut appended = Vec::new();
        for result in results {
            if result.id.is_empty() || result.response.is_empty() {
                continue;
            }
            let Some(identity) = self.find_request_identity(&result.id) else {
                continue;
            };

            self.remove_stale_pairs(&identity, &result.id);

            let timestamp = self.stamp();
            let event = Event::ToolResponse {
                timestamp,
                parent_key: None,
                tool_request_id: result.id.clone(),
                output: result.response.clone(),
            };
            self.messages.push(event.clone());
            appended.push(event);
        }
        if !appended.is_empty() {
            self.touch();
        }
        appended
    }

    fn find_request_identity(&self, tool_request_id: &str) -> Option<(String, String)> {
        self.messages.iter().find_map(|event| match event {
            Event::ToolRequest {
                tool_request_id: id,
                name,
                args,
                ..
            } if id == tool_request_id => Some((name.clone(), args.clone())),
            _ => None,
        })
    }

    /// Remove every `(name, args)`-identical `ToolRequest` (and its paired
    /// `ToolResponse`, if present) whose request id differs from `keep_id`.
    fn remove_stale_pairs(&mut self, identity: &(String, String), keep_id: &str) {
        let (name, args) = identity;
        let stale_ids: Vec<String> = self
            .messages
            .iter()
            .filter_map(|event| match event {
                Event::ToolRequest {
                    tool_request_id,
                    name: n,
                    args: a,
                    ..
                } if n == name && a == args && tool_request_id != keep_id => {
                    Some(tool_request_id.clone())
                }
                _ => None,
            })
            .collect();

        if stale_ids.is_empty() {
            return;
        }

        self.messages.retain(|event| match event {
            Event::ToolRequest { tool_request_id, .. } | Event::ToolResponse { tool_request_id, .. } => {
                !stale_ids.contains(tool_request_id)
            }
            _ => true,
        });
    }

    /// Rebuild a thread from a serialized event array (§4.2 *Replay*),
    /// filtering to the conversational subset in one pass; entries failing
    /// validation are skipped with no error.
    pub fn replay(
        id: ThreadId,
        name: String,
        summary: String,
        created_date: DateTime<Utc>,
        modified_date: DateTime<Utc>,
        price_usd: f64,
        events: Vec<Event>,
    ) -> Self {
        let messages: Vec<Event> = events.into_iter().filter(Event::is_conversational).collect();
        Self {
            id,
            name,
            summary,
            created_date,
            modified_date,
            price_usd,
            messages,
            clock: MonotonicClock::default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pairs(thread: &AiThread) -> Vec<(&str, &str, &str)> {
        thread
            .messages()
            .iter()
            .filter_map(|e| match e {
                Event::ToolResponse {
                    tool_request_id,
                    output,
                    ..
                } => Some((tool_request_id.as_str(), "response", output.as_str())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn dedup_keeps_single_pair_per_name_args() {
        let mut thread = AiThread::new("t");
        thread.add_tool_calls(&[ToolCallRequest {
            id: "r1".into(),
            name: "shell".into(),
            args: "{}".into(),
        }]);
        thread.add_tool_responses(&[ToolCallResult {
            id: "r1".into(),
            response: "old".into(),
        }]);

        thread.add_tool_calls(&[ToolCallRequest {
            id: "r2".into(),
            name: "shell".into(),
            args: "{}".into(),
        }]);
        thread.add_tool_responses(&[ToolCallResult {
            id: "r2".into(),
            response: "new".into(),
        }]);

        let responses = pairs(&thread);
        assert_eq!(responses, vec![("r2", "response", "new")]);
        let requests = thread
            .messages()
            .iter()
            .filter(|e| matches!(e, Event::ToolRequest { .. }))
            .count();
        assert_eq!(requests, 1);
    }

    #[test]
    fn tool_calls_missing_fields_are_skipped() {
        let mut thread = AiThread::new("t");
        let appended = thread.add_tool_calls(&[ToolCallRequest {
            id: String::new(),
            name: "shell".into(),
            args: "{}".into(),
        }]);
        assert!(appended.is_empty());
        assert!(thread.messages().is_empty());
    }

    #[test]
    fn tool_response_without_matching_request_is_ignored() {
        let mut thread = AiThread::new("t");
        let appended = thread.add_tool_responses(&[ToolCallResult {
            id: "missing".into(),
            response: "out".into(),
        }]);
        assert!(appended.is_empty());
        assert!(thread.messages().is_empty());
    }

    #[test]
    fn replay_filters_to_conversational_subset() {
        let mut thread = AiThread::new("t");
        thread.add_user_message("user", "hi");
        let events = thread.messages().to_vec();
        let mut all_events = events.clone();
        all_events.push(Event::HeartBeat {
            timestamp: "t-extra".into(),
            parent_key: None,
        });

        let replayed = AiThread::replay(
            thread.id,
            thread.name.clone(),
            thread.summary.clone(),
            thread.created_date,
            thread.modified_date,
            thread.price_usd,
            all_events,
        );
        assert_eq!(replayed.messages(), events.as_slice());
    }
}
