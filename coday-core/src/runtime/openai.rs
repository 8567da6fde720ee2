//! OpenAI Chat Completions binding (§6 "Provider wire mapping", OpenAI
//! column). Pure wire shapes live in [`super::wire::openai`]; this module
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

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: ProviderRequest<'_>) -> anyhow::Result<ProviderResponse> {
        let mut messages = vec![json!({
            "role": "system",
            "content": request.system_instructions,
        })];
        messages.extend(wire::openai::to_messages(request.messages));

        let tools: Vec<Value> = request
            .tools
            .tools()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters_schema(),
                    },
                })
            })
            .collect();

        let body = json!({
            "model": request.model_name,
            "temperature": request.temperature,
            "messages": messages,
            "tools": tools,
        });

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("openai request failed")?
            .error_for_status()
            .context("openai returned an error status")?
            .json::<Value>()
            .await
            .context("openai response was not valid JSON")?;

        parse_response(&response)
    }
}

fn parse_response(body: &Value) -> anyhow::Result<ProviderResponse> {
    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .context("missing choices[0]")?;

    let message = choice.get("message").context("missing choices[0].message")?;
    let text = message
        .get("content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string);

    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let id = call.get("id")?.as_str()?.to_string();
                    let function = call.get("function")?;
                    let name = function.get("name")?.as_str()?.to_string();
                    let args = function.get("arguments")?.as_str()?.to_string();
                    Some(ToolCallRequest { id, name, args })
                })
                .collect()
        })
        .unwrap_or_default();

    let finish_reason = match choice.get("finish_reason").and_then(Value::as_str) {
        Some("length") => FinishReason::MaxTokens,
        Some("tool_calls") => FinishReason::ToolUse,
        _ if !tool_calls.is_empty() => FinishReason::ToolUse,
        _ => FinishReason::Stop,
    };

    let usage = body.get("usage").map(parse_usage).unwrap_or_default();

    Ok(ProviderResponse {
        text,
        tool_calls,
        finish_reason,
        usage,
    })
}

fn parse_usage(usage: &Value) -> TokenUsage {
    TokenUsage {
        input_tokens: usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
        output_tokens: usage
            .get("completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        cached_tokens: usage
            .get("prompt_tokens_details")
            .and_then(|details| details.get("cached_tokens"))
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
            "choices": [{"message": {"role": "assistant", "content": "pong"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2},
        });
        let response = parse_response(&body).expect("parse");
        assert_eq!(response.text.as_deref(), Some("pong"));
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn parses_tool_calls_response() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{"id": "t1", "type": "function", "function": {"name": "shell", "arguments": "{\"cmd\":\"ls\"}"}}],
                },
                "finish_reason": "tool_calls",
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 1},
        });
        let response = parse_response(&body).expect("parse");
        assert!(response.text.is_none());
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.finish_reason, FinishReason::ToolUse);
    }

    #[test]
    fn length_finish_reason_maps_to_max_tokens() {
        let body = json!({
            "choices": [{"message": {"role": "assistant"}, "finish_reason": "length"}],
            "usage": {},
        });
        let response = parse_response(&body).expect("parse");
        assert_eq!(response.finish_reason, FinishReason::MaxTokens);
    }
}
