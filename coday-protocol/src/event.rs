use crate::FileOperation;
use crate::Role;
use serde::Deserialize;
use serde::Serialize;

/// A single entry in a conversation's event log (§3).
///
/// Every variant is discriminated on the wire by a `type` field equal to its
/// variant tag (`#[serde(tag = "type")]`), and carries a `timestamp` plus an
/// optional `parent_key` pointing back at another event's timestamp. Field
/// order on the wire is irrelevant; a decoder that sees an unknown `type`
/// must drop the event rather than error (§4.1) — see [`Event::from_json_line`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Message {
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,
        role: Role,
        content: String,
        name: String,
    },
    ToolRequest {
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,
        tool_request_id: String,
        name: String,
        /// JSON-encoded arguments, opaque to the thread itself.
        args: String,
    },
    ToolResponse {
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,
        tool_request_id: String,
        output: String,
    },
    Invite {
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,
        invite: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
    },
    Answer {
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,
        answer: String,
    },
    Choice {
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,
        options: Vec<String>,
        invite: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        optional_question: Option<String>,
    },
    Text {
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speaker: Option<String>,
        text: String,
    },
    Warn {
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,
        warning: String,
    },
    Error {
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,
        error: String,
    },
    HeartBeat {
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,
    },
    ProjectSelected {
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,
        project_name: String,
    },
    ThreadSelected {
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,
        thread_name: String,
    },
    FileEvent {
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_key: Option<String>,
        #[serde(flatten)]
        file: FileEventPayload,
    },
}

/// Payload specific to [`Event::FileEvent`], kept as its own type since it is
/// referenced from the tool-facing file watcher as well as the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEventPayload {
    pub operation: FileOperation,
    pub filename: String,
    pub size: u64,
}

impl Event {
    /// The timestamp every variant carries; doubles as the dedup/ordering key.
    pub fn timestamp(&self) -> &str {
        match self {
            Event::Message { timestamp, .. }
            | Event::ToolRequest { timestamp, .. }
            | Event::ToolResponse { timestamp, .. }
            | Event::Invite { timestamp, .. }
            | Event::Answer { timestamp, .. }
            | Event::Choice { timestamp, .. }
            | Event::Text { timestamp, .. }
            | Event::Warn { timestamp, .. }
            | Event::Error { timestamp, .. }
            | Event::HeartBeat { timestamp, .. }
            | Event::ProjectSelected { timestamp, .. }
            | Event::ThreadSelected { timestamp, .. }
            | Event::FileEvent { timestamp, .. } => timestamp,
        }
    }

    pub fn parent_key(&self) -> Option<&str> {
        match self {
            Event::Message { parent_key, .. }
            | Event::ToolRequest { parent_key, .. }
            | Event::ToolResponse { parent_key, .. }
            | Event::Invite { parent_key, .. }
            | Event::Answer { parent_key, .. }
            | Event::Choice { parent_key, .. }
            | Event::Text { parent_key, .. }
            | Event::Warn { parent_key, .. }
            | Event::Error { parent_key, .. }
            | Event::HeartBeat { parent_key, .. }
            | Event::ProjectSelected { parent_key, .. }
            | Event::ThreadSelected { parent_key, .. }
            | Event::FileEvent { parent_key, .. } => parent_key.as_deref(),
        }
    }

    /// Part of the conversational subset persisted in [`crate` consumers']
    /// `AiThread.messages` (§3): messages and tool request/response pairs.
    pub fn is_conversational(&self) -> bool {
        matches!(
            self,
            Event::Message { .. } | Event::ToolRequest { .. } | Event::ToolResponse { .. }
        )
    }

    /// `(name, args)` identity used by the tool-call dedup rule (§4.2), if
    /// this event is a `ToolRequest`.
    pub fn tool_request_identity(&self) -> Option<(&str, &str)> {
        match self {
            Event::ToolRequest { name, args, .. } => Some((name, args)),
            _ => None,
        }
    }

    pub fn tool_request_id(&self) -> Option<&str> {
        match self {
            Event::ToolRequest { tool_request_id, .. } | Event::ToolResponse { tool_request_id, .. } => {
                Some(tool_request_id)
            }
            _ => None,
        }
    }

    /// Deserialize a single line of the line-delimited JSON wire format
    /// (§4.1). An unknown `type` or malformed payload is dropped silently
    /// (returns `None`) for forward compatibility.
    pub fn from_json_line(line: &str) -> Option<Self> {
        serde_json::from_str(line).ok()
    }

    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_type_is_dropped_silently() {
        let line = r#"{"type":"something_new","timestamp":"t1"}"#;
        assert_eq!(Event::from_json_line(line), None);
    }

    #[test]
    fn round_trips_message() {
        let event = Event::Message {
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            parent_key: None,
            role: Role::User,
            content: "hi".to_string(),
            name: "user".to_string(),
        };
        let line = event.to_json_line().expect("serialize");
        assert_eq!(Event::from_json_line(&line), Some(event));
    }

    #[test]
    fn tool_request_identity_matches_name_and_args() {
        let event = Event::ToolRequest {
            timestamp: "t1".to_string(),
            parent_key: None,
            tool_request_id: "r1".to_string(),
            name: "shell".to_string(),
            args: "{}".to_string(),
        };
        assert_eq!(event.tool_request_identity(), Some(("shell", "{}")));
    }
}
