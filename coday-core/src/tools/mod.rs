//! Registry of callable tools and concurrent dispatch (§4.4).

mod output_cap;

pub use output_cap::cap_output;

use async_trait::async_trait;
use coday_protocol::Event;
use schemars::schema::RootSchema;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

/// A single named, schema-described callable exposed to the model (§4.4,
/// design notes "Tool interface"). Implementations that are not safe to run
/// concurrently with themselves should set [`Tool::is_serial`] to `true`;
/// the [`ToolSet`] then serializes calls to that tool behind an internal
/// mutex keyed by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> &RootSchema;

    /// Validate/parse the raw JSON arguments. Returning `Err` produces the
    /// `"Error: invalid args: ..."` response (§4.4 step 2).
    fn parse(&self, args: &str) -> anyhow::Result<serde_json::Value>;

    /// Run the tool body. Returning `Err` produces the `"Error: ..."`
    /// response (§4.4 step 3); the runtime continues regardless.
    async fn invoke(&self, args: serde_json::Value) -> anyhow::Result<String>;

    fn is_serial(&self) -> bool {
        false
    }

    /// Per-tool invocation timeout; defaults to the spec's 60s (§5).
    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }
}

/// A registry of [`Tool`]s available to one [`crate::runtime::Agent`],
/// dispatching concurrently with cancellation and error capture (§4.4, §5).
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: HashMap<String, Arc<dyn Tool>>,
    serial_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

/// Request to run a single tool, as produced by the agent loop (§4.4).
#[derive(Debug, Clone)]
pub struct ToolRunRequest {
    pub tool_request_id: String,
    pub name: String,
    pub args: String,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn tools(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.values()
    }

    async fn serial_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.serial_locks.lock().await;
        locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run one tool request, never raising an exception to the caller
    /// (§4.4): unknown tools, parse failures, and thrown errors are all
    /// captured into the `ToolResponse.output` with an `"Error: "` prefix.
    pub async fn run_tool(&self, request: ToolRunRequest) -> Event {
        let timestamp = crate::util::now_rfc3339();
        let output = self.run_tool_inner(&request).await;
        Event::ToolResponse {
            timestamp,
            parent_key: None,
            tool_request_id: request.tool_request_id,
            output: cap_output(&output),
        }
    }

    async fn run_tool_inner(&self, request: &ToolRunRequest) -> String {
        let Some(tool) = self.tools.get(&request.name).cloned() else {
            return format!("Error: unknown tool {}", request.name);
        };

        let parsed = match tool.parse(&request.args) {
            Ok(value) => value,
            Err(err) => return format!("Error: invalid args: {err}"),
        };

        let _guard = if tool.is_serial() {
            let lock = self.serial_lock(tool.name()).await;
            Some(lock.lock_owned().await)
        } else {
            None
        };

        match tokio::time::timeout(tool.timeout(), tool.invoke(parsed)).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => format!("Error: {err}"),
            Err(_) => {
                warn!(tool = tool.name(), "tool call timed out");
                format!("Error: tool '{}' timed out", tool.name())
            }
        }
    }
}
