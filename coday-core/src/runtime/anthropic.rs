//! Anthropic Messages API binding (§6 "Provider wire mapping", Anthropic
//! column). Pure wire shapes live in [`super::wire::anthropic`]; this module
//! owns the HTTP call and response interpretation.

use crate::runtime::provider::FinishReason;
use crate::runtime::provider::Provider;
use crate::runtime::provider::ProviderRequest;
use crate::runtime::provider::ProviderResponse;
use crate::runtime::provider::TokenUsage;
use crate::runtime::wire;
use crate::thread::ToolCallRequest;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the endpoint, for testing against a local mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: ProviderRequest<'_>) -> anyhow::Result<ProviderResponse> {
        let messages = wire::anthropic::to_messages(request.messages);
        let tools: Vec<Value> = request
            .tools
            .tools()
            .map(|tool| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "input_schema": tool.parameters_schema(),
                })
            })
            .collect();

        let body = json!({
            "model": request.model_name,
            "system": request.system_instructions,
            "temperature": request.temperature,
            "messages": messages,
            "tools": tools,
            "max_tokens": 8192,
        });

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .context("anthropic request failed")?
            .error_for_status()
            .context("anthropic returned an error status")?
            .json::<Value>()
            .await
            .context("anthropic response was not valid JSON")?;

        parse_response(&response)
    }
}

fn parse_response(body: &Value) -> anyhow::Result<ProviderResponse> {
    let content = body
        .get("content")
        .and_then(Value::as_array)
        .context("missing content array")?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in content {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(chunk) = block.get("text").and_then(Value::as_str) {
                    text.push_str(chunk);
                }
            }
            Some("tool_use") => {
                let id = block.get("id").and_then(Value::as_str).unwrap_or_default();
                let name = block.get("name").and_then(Value::as_str).unwrap_or_default();
                let input = block.get("input").cloned().unwrap_or(Value::Null);
                tool_calls.push(ToolCallRequest {
                    id: id.to_string(),
                    name: name.to_string(),
                    args: input.to_string(),
                });
            }
            _ => {}
        }
    }

    let finish_reason = match body.get("stop_reason").and_then(Value::as_str) {
        Some("max_tokens") => FinishReason::MaxTokens,
        Some("tool_use") => FinishReason::ToolUse,
        _ if !tool_calls.is_empty() => FinishReason::ToolUse,
        _ => FinishReason::Stop,
    };

    let usage = body.get("usage").map(parse_usage).unwrap_or_default();

    Ok(ProviderResponse {
        text: if text.is_empty() { None } else { Some(text) },
        tool_calls,
        finish_reason,
        usage,
    })
}

fn parse_usage(usage: &Value) -> TokenUsage {
    TokenUsage {
        input_tokens: usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
        output_tokens: usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
        cached_tokens: usage
            .get("cache_read_input_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_text_response() {
        let body = json!({
            "content": [{"type": "text", "text": "pong"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 2},
        });
        let response = parse_response(&body).expect("parse");
        assert_eq!(response.text.as_deref(), Some("pong"));
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage.input_tokens, 10);
    }

    #[test]
    fn parses_tool_use_response() {
        let body = json!({
            "content": [{"type": "tool_use", "id": "t1", "name": "shell", "input": {"cmd": "ls"}}],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 5, "output_tokens": 1},
        });
        let response = parse_response(&body).expect("parse");
        assert!(response.text.is_none());
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "shell");
        assert_eq!(response.finish_reason, FinishReason::ToolUse);
    }

    #[test]
    fn max_tokens_stop_reason_is_recognised() {
        let body = json!({"content": [], "stop_reason": "max_tokens", "usage": {}});
        let response = parse_response(&body).expect("parse");
        assert_eq!(response.finish_reason, FinishReason::MaxTokens);
    }
}
