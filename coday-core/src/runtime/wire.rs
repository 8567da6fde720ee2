//! Provider wire mapping (§6 "Provider wire mapping"). Pure, side-effect
//! free translation of the thread's conversational events into each
//! provider's native message shape — the runtime must perform exactly these
//! translations and no others.

use coday_protocol::Event;
use coday_protocol::Role;
use serde_json::Value;
use serde_json::json;

pub mod anthropic {
    use super::*;

    pub fn to_messages(events: &[Event]) -> Vec<Value> {
        events.iter().filter_map(to_message).collect()
    }

    fn to_message(event: &Event) -> Option<Value> {
        match event {
            Event::Message { role, content, .. } => Some(json!({
                "role": role_str(*role),
                "content": content,
            })),
            Event::ToolRequest {
                tool_request_id,
                name,
                args,
                ..
            } => {
                let input: Value = serde_json::from_str(args).unwrap_or(Value::Null);
                Some(json!({
                    "role": "assistant",
                    "content": [{
                        "type": "tool_use",
                        "id": tool_request_id,
                        "name": name,
                        "input": input,
                    }],
                }))
            }
            Event::ToolResponse {
                tool_request_id,
                output,
                ..
            } => Some(json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": tool_request_id,
                    "content": output,
                }],
            })),
            _ => None,
        }
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "user",
        }
    }
}

pub mod openai {
    use super::*;

    pub fn to_messages(events: &[Event]) -> Vec<Value> {
        events.iter().filter_map(to_message).collect()
    }

    fn to_message(event: &Event) -> Option<Value> {
        match event {
            Event::Message { role, content, .. } => Some(json!({
                "role": role_str(*role),
                "content": content,
            })),
            Event::ToolRequest {
                tool_request_id,
                name,
                args,
                ..
            } => Some(json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": tool_request_id,
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": args,
                    },
                }],
            })),
            Event::ToolResponse {
                tool_request_id,
                output,
                ..
            } => Some(json!({
                "role": "tool",
                "tool_call_id": tool_request_id,
                "content": output,
            })),
            _ => None,
        }
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user_message() -> Event {
        Event::Message {
            timestamp: "t1".into(),
            parent_key: None,
            role: Role::User,
            content: "hi".into(),
            name: "user".into(),
        }
    }

    fn tool_request() -> Event {
        Event::ToolRequest {
            timestamp: "t2".into(),
            parent_key: None,
            tool_request_id: "req1".into(),
            name: "shell".into(),
            args: r#"{"cmd":"ls"}"#.into(),
        }
    }

    fn tool_response() -> Event {
        Event::ToolResponse {
            timestamp: "t3".into(),
            parent_key: None,
            tool_request_id: "req1".into(),
            output: "a.txt".into(),
        }
    }

    #[test]
    fn anthropic_maps_user_message() {
        let mapped = anthropic::to_messages(&[user_message()]);
        assert_eq!(mapped, vec![json!({"role": "user", "content": "hi"})]);
    }

    #[test]
    fn anthropic_maps_tool_request_and_response() {
        let mapped = anthropic::to_messages(&[tool_request(), tool_response()]);
        assert_eq!(
            mapped,
            vec![
                json!({
                    "role": "assistant",
                    "content": [{"type": "tool_use", "id": "req1", "name": "shell", "input": {"cmd": "ls"}}],
                }),
                json!({
                    "role": "user",
                    "content": [{"type": "tool_result", "tool_use_id": "req1", "content": "a.txt"}],
                }),
            ]
        );
    }

    #[test]
    fn openai_maps_tool_request_and_response() {
        let mapped = openai::to_messages(&[tool_request(), tool_response()]);
        assert_eq!(
            mapped,
            vec![
                json!({
                    "role": "assistant",
                    "tool_calls": [{"id": "req1", "type": "function", "function": {"name": "shell", "arguments": r#"{"cmd":"ls"}"#}}],
                }),
                json!({"role": "tool", "tool_call_id": "req1", "content": "a.txt"}),
            ]
        );
    }
}
