//! The AiClient runtime: the provider-agnostic agent loop (§4.7). One
//! `run()` call drives a recursive interaction with a [`Provider`] until no
//! tool work remains, streaming every produced [`Event`] to the caller.

mod agent;
mod anthropic;
mod cost;
mod openai;
mod provider;
mod run_status;
mod ticker;
mod wire;

pub use agent::Agent;
pub use agent::ModelSize;
pub use agent::ToolFilter;
pub use agent::DEFAULT_TEMPERATURE;
pub use anthropic::AnthropicProvider;
pub use cost::CostLedger;
pub use cost::ModelPrice;
pub use cost::PriceTable;
pub use openai::OpenAiProvider;
pub use provider::FinishReason;
pub use provider::Provider;
pub use provider::ProviderRequest;
pub use provider::ProviderResponse;
pub use provider::TokenUsage;
pub use run_status::RunControl;
pub use run_status::RunStatus;
pub use ticker::Ticker;
pub use ticker::HEARTBEAT_INTERVAL;

use crate::thread::AiThread;
use crate::thread::ToolCallRequest;
use crate::thread::ToolCallResult;
use crate::tools::ToolRunRequest;
use crate::util::now_rfc3339;
use coday_protocol::Event;
use std::sync::Arc;
use ticker::THINKING_INTERVAL;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tracing::error;
use tracing::warn;

/// Upper bound on tool invocations dispatched concurrently within one
/// iteration (§5 "bounded worker pool, target 8").
const DEFAULT_TOOL_CONCURRENCY: usize = 8;

/// Depth of the per-run event channel; generous enough that a burst of
/// parallel tool events never blocks the loop on a slow consumer.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Drives [`Agent`]s against a single [`Provider`] (§4.7). Stateless aside
/// from its configuration — one instance is shared across every session's
/// runs.
#[derive(Clone)]
pub struct AiClientRuntime {
    provider: Arc<dyn Provider>,
    prices: PriceTable,
    price_threshold: Option<f64>,
    tool_concurrency: usize,
}

impl AiClientRuntime {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            prices: PriceTable::new(),
            price_threshold: None,
            tool_concurrency: DEFAULT_TOOL_CONCURRENCY,
        }
    }

    pub fn with_price_table(mut self, prices: PriceTable) -> Self {
        self.prices = prices;
        self
    }

    /// Set a session-configured `priceThreshold` (§4.7 *Cost accounting*):
    /// once exceeded, the next iteration is inhibited and a `Warn` event is
    /// emitted instead of recursing.
    pub fn with_price_threshold(mut self, threshold: f64) -> Self {
        self.price_threshold = Some(threshold);
        self
    }

    /// Start one `run(agent, thread)` invocation (§4.7). Returns a lazy
    /// event stream; the loop itself runs on a detached task so dropping the
    /// stream early does not corrupt the thread, only stops delivery.
    pub fn run(
        &self,
        agent: Agent,
        thread: Arc<RwLock<AiThread>>,
        control: RunControl,
    ) -> ReceiverStream<Event> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let runtime = self.clone();
        tokio::spawn(async move {
            runtime.drive(agent, thread, control, tx).await;
        });
        ReceiverStream::new(rx)
    }

    fn model_key(&self, agent: &Agent) -> String {
        let model = agent.model_name.as_deref().unwrap_or("default");
        format!("{}:{}", self.provider.name(), model)
    }

    async fn drive(
        &self,
        agent: Agent,
        thread: Arc<RwLock<AiThread>>,
        control: RunControl,
        tx: mpsc::Sender<Event>,
    ) {
        control.set(RunStatus::Running);
        let mut ledger = CostLedger::new();
        let model_key = self.model_key(&agent);

        loop {
            let response = match self.call_provider(&agent, &thread, &tx).await {
                Ok(response) => response,
                Err(err) => {
                    error!(error = %err, "provider call failed");
                    control.set(RunStatus::Failed);
                    let _ = emit(
                        &tx,
                        Event::Error {
                            timestamp: now_rfc3339(),
                            parent_key: None,
                            error: err.to_string(),
                        },
                    )
                    .await;
                    return;
                }
            };

            let cost = ledger.record(&self.prices, &model_key, response.usage);
            if cost > 0.0 {
                thread.write().await.record_cost(cost);
            }

            if response.finish_reason == FinishReason::MaxTokens {
                control.set(RunStatus::Failed);
                let _ = emit(
                    &tx,
                    Event::Error {
                        timestamp: now_rfc3339(),
                        parent_key: None,
                        error: "max tokens".to_string(),
                    },
                )
                .await;
                return;
            }

            if let Some(text) = response.text.filter(|text| !text.is_empty()) {
                let event = {
                    let mut thread = thread.write().await;
                    thread.add_agent_message(agent.name.clone(), text)
                };
                if emit(&tx, event).await.is_err() {
                    return;
                }
            }

            if response.tool_calls.is_empty() {
                control.set(RunStatus::Completed);
                return;
            }

            let requests = {
                let mut thread = thread.write().await;
                thread.add_tool_calls(&response.tool_calls)
            };
            for request in &requests {
                if emit(&tx, request.clone()).await.is_err() {
                    return;
                }
            }

            if self
                .dispatch_tools(&agent, &thread, &requests, &tx)
                .await
                .is_err()
            {
                return;
            }

            if ledger.exceeds(self.price_threshold) {
                control.set(RunStatus::Stopped);
                let _ = emit(
                    &tx,
                    Event::Warn {
                        timestamp: now_rfc3339(),
                        parent_key: None,
                        warning: "price threshold exceeded; stopping".to_string(),
                    },
                )
                .await;
                return;
            }

            if control.is_stopped() {
                return;
            }
        }
    }

    /// Build the provider request and drive it to completion, emitting a
    /// periodic "thinking" [`Event::Text`] every [`THINKING_INTERVAL`] while
    /// it is outstanding (§4.7 steps 1-3).
    async fn call_provider(
        &self,
        agent: &Agent,
        thread: &Arc<RwLock<AiThread>>,
        tx: &mpsc::Sender<Event>,
    ) -> anyhow::Result<ProviderResponse> {
        let messages = thread.read().await.messages().to_vec();
        let model_name = agent.model_name.as_deref().unwrap_or("default");
        let request = ProviderRequest {
            system_instructions: &agent.system_instructions,
            temperature: agent.temperature,
            messages: &messages,
            tools: &agent.tools,
            model_name,
        };

        let call = self.provider.complete(request);
        tokio::pin!(call);
        let mut ticker = Ticker::new(THINKING_INTERVAL);

        loop {
            tokio::select! {
                biased;
                result = &mut call => return result,
                _ = ticker.tick() => {
                    let _ = tx
                        .send(Event::Text {
                            timestamp: now_rfc3339(),
                            parent_key: None,
                            speaker: Some(agent.name.clone()),
                            text: "...thinking...".to_string(),
                        })
                        .await;
                }
            }
        }
    }

    /// Run every tool request concurrently (bounded by
    /// `self.tool_concurrency`), appending and emitting each
    /// `ToolResponse` as soon as it completes — in completion order, not
    /// request order (§4.7 *Ordering guarantees*).
    async fn dispatch_tools(
        &self,
        agent: &Agent,
        thread: &Arc<RwLock<AiThread>>,
        requests: &[Event],
        tx: &mpsc::Sender<Event>,
    ) -> Result<(), ()> {
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.tool_concurrency));
        let mut tasks = JoinSet::new();

        for request in requests {
            let (tool_request_id, name, args) = match request {
                Event::ToolRequest {
                    tool_request_id,
                    name,
                    args,
                    ..
                } => (tool_request_id.clone(), name.clone(), args.clone()),
                _ => continue,
            };
            let tools = agent.tools.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                tools
                    .run_tool(ToolRunRequest {
                        tool_request_id,
                        name,
                        args,
                    })
                    .await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let response_event = match joined {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "tool task panicked");
                    continue;
                }
            };
            let Event::ToolResponse {
                tool_request_id,
                output,
                ..
            } = &response_event
            else {
                continue;
            };

            let appended = {
                let mut thread = thread.write().await;
                thread.add_tool_responses(&[ToolCallResult {
                    id: tool_request_id.clone(),
                    response: output.clone(),
                }])
            };
            for event in appended {
                emit(tx, event).await.map_err(|_| ())?;
            }
        }

        Ok(())
    }
}

async fn emit(tx: &mpsc::Sender<Event>, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
    tx.send(event).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::thread::AiThread;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use schemars::schema::RootSchema;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use tokio_stream::StreamExt;

    struct EchoProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: ProviderRequest<'_>) -> anyhow::Result<ProviderResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                Ok(ProviderResponse {
                    text: None,
                    tool_calls: vec![ToolCallRequest {
                        id: "t1".into(),
                        name: "noop".into(),
                        args: "{}".into(),
                    }],
                    finish_reason: FinishReason::ToolUse,
                    usage: TokenUsage::default(),
                })
            } else {
                let _ = request;
                Ok(ProviderResponse {
                    text: Some("done".into()),
                    tool_calls: vec![],
                    finish_reason: FinishReason::Stop,
                    usage: TokenUsage::default(),
                })
            }
        }
    }

    struct NoopTool {
        schema: RootSchema,
    }

    #[async_trait]
    impl Tool for NoopTool {
        fn name(&self) -> &str {
            "noop"
        }
        fn description(&self) -> &str {
            "does nothing"
        }
        fn parameters_schema(&self) -> &RootSchema {
            &self.schema
        }
        fn parse(&self, _args: &str) -> anyhow::Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
        async fn invoke(&self, _args: serde_json::Value) -> anyhow::Result<String> {
            Ok("ok".to_string())
        }
    }

    #[tokio::test]
    async fn run_recurses_until_no_tool_calls() {
        let provider = Arc::new(EchoProvider {
            calls: AtomicUsize::new(0),
        });
        let mut agent = Agent::new("assistant", "be terse");
        agent.tools.register(Arc::new(NoopTool {
            schema: schemars::schema_for!(()),
        }));

        let runtime = AiClientRuntime::new(provider);
        let thread = Arc::new(RwLock::new(AiThread::new("t")));
        let control = RunControl::new();

        let mut stream = runtime.run(agent, thread.clone(), control.clone());
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }

        assert!(matches!(events[0], Event::ToolRequest { .. }));
        assert!(matches!(events[1], Event::ToolResponse { .. }));
        assert!(matches!(events.last(), Some(Event::Message { .. })));
        assert_eq!(control.status(), RunStatus::Completed);
    }
}
