//! The bounded model/tool loop.
//!
//! One turn moves through `AwaitingModel → ToolExecuting → AwaitingModel → …`
//! until the model gives a final answer (`Done`) or the round cap is hit
//! (`Exceeded`). A round is one model call; if the last allowed call still
//! asks for tools, those calls are not executed.
//!
//! Tool failures never end the turn. They are turned into `Error: …` text
//! and handed back to the model as the tool's result.

use async_trait::async_trait;
use codehelper_core::error::{ToolError, TurnError};
use codehelper_core::event::{DomainEvent, EventBus};
use codehelper_core::message::Message;
use codehelper_core::provider::ToolDefinition;
use codehelper_core::tool::{ToolCall, ToolRegistry};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::model::{to_message_call, ModelClient, ModelTurn, StreamItem, WorkingContext};
use crate::reconstructor::StreamReconstructor;
use crate::stream_event::AssistantStreamEvent;

pub const DEFAULT_MAX_ROUNDS: usize = 5;

#[derive(Debug)]
enum LoopState {
    AwaitingModel,
    ToolExecuting(Vec<ToolCall>),
    Done(String),
    Exceeded,
}

/// Result of a completed loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    pub answer: String,
    /// Model calls made, including the one that produced the answer.
    pub rounds: usize,
}

/// How one model round is obtained and how tool activity is reported.
#[async_trait]
pub trait RoundDriver: Send {
    async fn ask(
        &mut self,
        ctx: &WorkingContext,
        tools: &[ToolDefinition],
    ) -> Result<ModelTurn, TurnError>;

    async fn tool_started(&mut self, _call: &ToolCall) -> Result<(), TurnError> {
        Ok(())
    }

    async fn tool_finished(
        &mut self,
        _call: &ToolCall,
        _output: &str,
        _success: bool,
    ) -> Result<(), TurnError> {
        Ok(())
    }
}

/// Plain request/response rounds.
pub struct BlockingRound<'a> {
    model: &'a ModelClient,
}

impl<'a> BlockingRound<'a> {
    pub fn new(model: &'a ModelClient) -> Self {
        Self { model }
    }
}

#[async_trait]
impl RoundDriver for BlockingRound<'_> {
    async fn ask(
        &mut self,
        ctx: &WorkingContext,
        tools: &[ToolDefinition],
    ) -> Result<ModelTurn, TurnError> {
        Ok(self.model.complete(ctx, tools).await?)
    }
}

/// Streamed rounds. Fragments are reconstructed and pushed to `events` as
/// they arrive; tool activity is reported as events too.
///
/// If the receiving side of `events` goes away while the model is streaming,
/// the model stream is dropped (which stops the provider) and the turn ends
/// with [`TurnError::StreamTransport`]. A tool that is already running is
/// left to finish, and its result is discarded.
pub struct StreamingRound<'a> {
    model: &'a ModelClient,
    events: &'a mpsc::Sender<AssistantStreamEvent>,
    reconstructor: StreamReconstructor,
}

impl<'a> StreamingRound<'a> {
    pub fn new(model: &'a ModelClient, events: &'a mpsc::Sender<AssistantStreamEvent>) -> Self {
        Self {
            model,
            events,
            reconstructor: StreamReconstructor::new(),
        }
    }

    async fn emit(&self, event: AssistantStreamEvent) -> Result<(), TurnError> {
        self.events
            .send(event)
            .await
            .map_err(|_| TurnError::StreamTransport("client disconnected".into()))
    }
}

#[async_trait]
impl RoundDriver for StreamingRound<'_> {
    async fn ask(
        &mut self,
        ctx: &WorkingContext,
        tools: &[ToolDefinition],
    ) -> Result<ModelTurn, TurnError> {
        let mut stream = self.model.stream_complete(ctx, tools).await?;
        let mut text = String::new();
        let mut calls = Vec::new();

        loop {
            let item = tokio::select! {
                item = stream.next() => item,
                _ = self.events.closed() => {
                    debug!("Client went away mid-stream");
                    return Err(TurnError::StreamTransport("client disconnected".into()));
                }
            };
            match item {
                None => break,
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(StreamItem::Fragment(fragment))) => {
                    text.push_str(&fragment);
                    if let Some(chunk) = self.reconstructor.push(&fragment) {
                        self.emit(AssistantStreamEvent::Chunk { content: chunk.text }).await?;
                    }
                }
                Some(Ok(StreamItem::ToolCalls(requested))) => calls.extend(requested),
            }
        }

        if calls.is_empty() {
            Ok(ModelTurn::FinalAnswer(text))
        } else {
            Ok(ModelTurn::ToolCallRequest(calls))
        }
    }

    async fn tool_started(&mut self, call: &ToolCall) -> Result<(), TurnError> {
        self.emit(AssistantStreamEvent::ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.arguments.clone(),
        })
        .await
    }

    async fn tool_finished(
        &mut self,
        call: &ToolCall,
        output: &str,
        success: bool,
    ) -> Result<(), TurnError> {
        self.emit(AssistantStreamEvent::ToolResult {
            id: call.id.clone(),
            name: call.name.clone(),
            output: output.to_string(),
            success,
        })
        .await
    }
}

/// Runs the model/tool loop against a read-only tool registry.
pub struct ToolOrchestrator {
    tools: Arc<ToolRegistry>,
    max_rounds: usize,
    tool_timeout: Duration,
    event_bus: Arc<EventBus>,
}

impl ToolOrchestrator {
    pub fn new(tools: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self {
            tools,
            max_rounds: DEFAULT_MAX_ROUNDS,
            tool_timeout: Duration::from_secs(30),
            event_bus,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Run the loop until a final answer or the round cap.
    ///
    /// Tool calls and their results are appended to `ctx.continuation`.
    pub async fn run<D: RoundDriver + ?Sized>(
        &self,
        driver: &mut D,
        ctx: &mut WorkingContext,
    ) -> Result<LoopOutcome, TurnError> {
        let definitions = self.tools.definitions();
        let mut round = 0;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    round += 1;
                    debug!(round, max_rounds = self.max_rounds, "Awaiting model");
                    match driver.ask(ctx, &definitions).await? {
                        ModelTurn::FinalAnswer(answer) => LoopState::Done(answer),
                        ModelTurn::ToolCallRequest(calls) if round >= self.max_rounds => {
                            warn!(
                                round,
                                requested = calls.len(),
                                "Round cap reached with tool calls outstanding"
                            );
                            LoopState::Exceeded
                        }
                        ModelTurn::ToolCallRequest(calls) => LoopState::ToolExecuting(calls),
                    }
                }
                LoopState::ToolExecuting(calls) => {
                    ctx.push(Message::assistant_tool_calls(
                        "",
                        calls.iter().map(to_message_call).collect(),
                    ));
                    for call in &calls {
                        driver.tool_started(call).await?;
                        let (output, success) = self.execute(call).await;
                        ctx.push(Message::tool_result(&call.id, &output));
                        driver.tool_finished(call, &output, success).await?;
                    }
                    LoopState::AwaitingModel
                }
                LoopState::Done(answer) => {
                    return Ok(LoopOutcome {
                        answer,
                        rounds: round,
                    });
                }
                LoopState::Exceeded => {
                    return Err(TurnError::ToolLoopExceeded {
                        rounds: self.max_rounds,
                    });
                }
            };
        }
    }

    /// Run the loop with plain request/response rounds.
    pub async fn complete(
        &self,
        model: &ModelClient,
        ctx: &mut WorkingContext,
    ) -> Result<LoopOutcome, TurnError> {
        self.run(&mut BlockingRound::new(model), ctx).await
    }

    /// Run the loop with streamed rounds, pushing events to `events`.
    pub async fn stream(
        &self,
        model: &ModelClient,
        ctx: &mut WorkingContext,
        events: &mpsc::Sender<AssistantStreamEvent>,
    ) -> Result<LoopOutcome, TurnError> {
        self.run(&mut StreamingRound::new(model, events), ctx).await
    }

    /// Execute one call. Failures and timeouts come back as error text.
    pub async fn execute(&self, call: &ToolCall) -> (String, bool) {
        let start = Instant::now();
        let outcome = match tokio::time::timeout(self.tool_timeout, self.tools.execute(call)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool_name: call.name.clone(),
                timeout_secs: self.tool_timeout.as_secs(),
            }),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let (output, success) = match outcome {
            Ok(result) => {
                debug!(tool = %call.name, duration_ms, success = result.success, "Tool finished");
                (result.output, result.success)
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                (format!("Error: {e}"), false)
            }
        };

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success,
            duration_ms,
            timestamp: chrono::Utc::now(),
        });
        (output, success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use codehelper_core::message::Role;
    use codehelper_core::tool::{RemoteToolSpec, RemoteToolTransport, ToolCapability, ToolDescriptor};
    use std::sync::atomic::Ordering;

    fn ctx() -> WorkingContext {
        WorkingContext::new("system", vec![], Message::user("question"))
    }

    fn orchestrator(registry: ToolRegistry) -> ToolOrchestrator {
        ToolOrchestrator::new(Arc::new(registry), Arc::new(EventBus::default()))
    }

    fn echo_registry() -> (ToolRegistry, Arc<std::sync::atomic::AtomicUsize>) {
        let tool = EchoTool::new();
        let calls = tool.calls.clone();
        let mut registry = ToolRegistry::new();
        registry.register_local(Box::new(tool)).unwrap();
        (registry, calls)
    }

    #[tokio::test]
    async fn final_answer_in_one_round() {
        let model = ModelClient::new(Arc::new(SequentialMockProvider::single_text("Hi!")), "m");
        let mut ctx = ctx();
        let outcome = orchestrator(ToolRegistry::new()).complete(&model, &mut ctx).await.unwrap();
        assert_eq!(outcome, LoopOutcome { answer: "Hi!".into(), rounds: 1 });
        assert!(ctx.continuation.is_empty());
    }

    #[tokio::test]
    async fn tool_result_is_fed_back_to_the_model() {
        let provider = Arc::new(SequentialMockProvider::tool_then_answer(
            vec![make_tool_call("echo", serde_json::json!({"text": "pong"}))],
            "",
            "The tool said pong.",
        ));
        let model = ModelClient::new(provider.clone(), "m");
        let (registry, calls) = echo_registry();
        let mut ctx = ctx();

        let outcome = orchestrator(registry).complete(&model, &mut ctx).await.unwrap();
        assert_eq!(outcome.answer, "The tool said pong.");
        assert_eq!(outcome.rounds, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let second = &provider.requests()[1].messages;
        let tool_msg = second.last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.content, "pong");
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_echo"));
        let request_msg = &second[second.len() - 2];
        assert_eq!(request_msg.tool_calls[0].name, "echo");
    }

    #[tokio::test]
    async fn tool_error_becomes_text_and_loop_continues() {
        let provider = Arc::new(SequentialMockProvider::tool_then_answer(
            vec![make_tool_call("echo", serde_json::json!({"fail": true}))],
            "",
            "Recovered.",
        ));
        let model = ModelClient::new(provider.clone(), "m");
        let (registry, _) = echo_registry();

        let outcome = orchestrator(registry).complete(&model, &mut ctx()).await.unwrap();
        assert_eq!(outcome.answer, "Recovered.");
        let tool_msg = provider.requests()[1].messages.last().cloned().unwrap();
        assert!(tool_msg.content.starts_with("Error: "));
        assert!(tool_msg.content.contains("asked to fail"));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_the_model() {
        let provider = Arc::new(SequentialMockProvider::tool_then_answer(
            vec![make_tool_call("nope", serde_json::json!({}))],
            "",
            "Ok.",
        ));
        let model = ModelClient::new(provider.clone(), "m");

        orchestrator(ToolRegistry::new()).complete(&model, &mut ctx()).await.unwrap();
        let tool_msg = provider.requests()[1].messages.last().cloned().unwrap();
        assert_eq!(tool_msg.content, "Error: Tool not found: nope");
    }

    #[tokio::test]
    async fn endless_tool_calls_hit_the_cap() {
        let provider = Arc::new(SequentialMockProvider::always_tool(make_tool_call(
            "echo",
            serde_json::json!({"text": "again"}),
        )));
        let model = ModelClient::new(provider.clone(), "m");
        let (registry, calls) = echo_registry();

        let err = orchestrator(registry).complete(&model, &mut ctx()).await.unwrap_err();
        assert!(matches!(err, TurnError::ToolLoopExceeded { rounds: 5 }));
        assert_eq!(provider.call_count(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn cap_is_configurable() {
        let provider = Arc::new(SequentialMockProvider::always_tool(make_tool_call(
            "echo",
            serde_json::json!({}),
        )));
        let model = ModelClient::new(provider.clone(), "m");
        let (registry, _) = echo_registry();

        let err = orchestrator(registry)
            .with_max_rounds(2)
            .complete(&model, &mut ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::ToolLoopExceeded { rounds: 2 }));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let mut registry = ToolRegistry::new();
        registry.register_local(Box::new(SleepyTool)).unwrap();
        let orchestrator = orchestrator(registry).with_tool_timeout(Duration::from_secs(2));
        let call = ToolCall {
            id: "c1".into(),
            name: "sleepy".into(),
            arguments: serde_json::json!({}),
        };

        let (output, success) = orchestrator.execute(&call).await;
        assert!(!success);
        assert_eq!(output, "Error: Tool timed out: sleepy after 2s");
    }

    #[tokio::test]
    async fn tool_execution_publishes_event() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let (registry, _) = echo_registry();
        let orchestrator = ToolOrchestrator::new(Arc::new(registry), bus);

        orchestrator
            .execute(&ToolCall {
                id: "c".into(),
                name: "echo".into(),
                arguments: serde_json::json!({"text": "x"}),
            })
            .await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event.as_ref(),
            DomainEvent::ToolExecuted { tool_name, success: true, .. } if tool_name == "echo"
        ));
    }

    struct UpperServer;

    #[async_trait]
    impl RemoteToolTransport for UpperServer {
        fn server_name(&self) -> &str {
            "text"
        }

        async fn list_tools(&self) -> Result<Vec<RemoteToolSpec>, ToolError> {
            Ok(vec![])
        }

        async fn invoke(&self, name: &str, arguments: serde_json::Value) -> Result<String, ToolError> {
            assert_eq!(name, "upper");
            Ok(arguments["text"].as_str().unwrap_or_default().to_uppercase())
        }
    }

    #[tokio::test]
    async fn remote_tools_dispatch_through_transport() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor {
                name: "text_upper".into(),
                description: "Uppercase".into(),
                parameters: serde_json::json!({"type": "object"}),
                capability: ToolCapability::Remote {
                    remote_name: "upper".into(),
                    transport: Arc::new(UpperServer),
                },
            })
            .unwrap();
        let provider = Arc::new(SequentialMockProvider::tool_then_answer(
            vec![make_tool_call("text_upper", serde_json::json!({"text": "shout"}))],
            "",
            "SHOUT it is.",
        ));
        let model = ModelClient::new(provider.clone(), "m");

        orchestrator(registry).complete(&model, &mut ctx()).await.unwrap();
        let tool_msg = provider.requests()[1].messages.last().cloned().unwrap();
        assert_eq!(tool_msg.content, "SHOUT");
    }

    #[tokio::test]
    async fn streaming_rounds_emit_spaced_chunks_and_tool_events() {
        let provider = Arc::new(SequentialMockProvider::tool_then_answer(
            vec![make_tool_call("echo", serde_json::json!({"text": "pong"}))],
            "",
            "Hello world, 你好 !",
        ));
        let model = ModelClient::new(provider, "m");
        let (registry, _) = echo_registry();
        let (tx, mut rx) = mpsc::channel(64);

        let outcome = orchestrator(registry).stream(&model, &mut ctx(), &tx).await.unwrap();
        drop(tx);
        assert_eq!(outcome.answer, "Hello world, 你好 !");

        let mut types = Vec::new();
        let mut chunks = Vec::new();
        while let Some(event) = rx.recv().await {
            types.push(event.event_type());
            if let AssistantStreamEvent::Chunk { content } = event {
                chunks.push(content);
            }
        }
        assert_eq!(types[..2], ["tool_call", "tool_result"]);
        assert_eq!(chunks, vec!["Hello", " world,", "你好", "!"]);
    }

    #[tokio::test]
    async fn dropped_receiver_stops_the_stream() {
        let sent = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let cancelled = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let provider = Arc::new(SlowStreamProvider {
            fragments: (0..50).map(|i| format!("w{i}")).collect(),
            delay: Duration::from_millis(5),
            sent: sent.clone(),
            cancelled: cancelled.clone(),
        });
        let model = ModelClient::new(provider, "m");
        let orchestrator = orchestrator(ToolRegistry::new());
        let (tx, mut rx) = mpsc::channel(1);

        let consumer = tokio::spawn(async move {
            let first = rx.recv().await;
            drop(rx);
            first
        });
        let err = orchestrator.stream(&model, &mut ctx(), &tx).await.unwrap_err();
        assert!(matches!(err, TurnError::StreamTransport(_)));
        assert!(consumer.await.unwrap().is_some());

        for _ in 0..100 {
            if cancelled.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(cancelled.load(Ordering::SeqCst));
        assert!(sent.load(Ordering::SeqCst) < 50);
    }
}
