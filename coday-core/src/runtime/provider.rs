use crate::thread::ToolCallRequest;
use crate::tools::ToolSet;
use async_trait::async_trait;
use coday_protocol::Event;

/// Provider-agnostic request built from a thread for one iteration (§4.7
/// step 1).
pub struct ProviderRequest<'a> {
    pub system_instructions: &'a str,
    pub temperature: f64,
    pub messages: &'a [Event],
    pub tools: &'a ToolSet,
    pub model_name: &'a str,
}

/// Why the provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolUse,
    MaxTokens,
}

/// Token accounting a provider reports per call (§4.7 *Cost accounting*).
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
}

/// A provider's response to one [`ProviderRequest`]: zero or more plain-text
/// segments plus zero or more tool requests (§4.7 step 4).
pub struct ProviderResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: FinishReason,
    pub usage: TokenUsage,
}

/// A provider-agnostic chat completion call (§4.7, §6 "Provider wire
/// mapping"). Concrete implementations translate [`ProviderRequest`] into
/// their own wire format and translate the response back.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Machine-readable name, used to look up this provider's price table
    /// entry (§4.7 *Cost accounting*).
    fn name(&self) -> &str;

    async fn complete(&self, request: ProviderRequest<'_>) -> anyhow::Result<ProviderResponse>;
}
