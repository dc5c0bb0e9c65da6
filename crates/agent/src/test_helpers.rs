//! Shared test helpers: scripted providers and tools.

use async_trait::async_trait;
use codehelper_core::error::{ProviderError, ToolError};
use codehelper_core::message::{Message, MessageToolCall};
use codehelper_core::provider::{Provider, ProviderRequest, ProviderResponse, StreamDelta, Usage};
use codehelper_core::tool::{Tool, ToolResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` or `stream` consumes the next entry. Once the
/// script runs out every call fails with an API error. When streaming, a
/// text answer is sent one word per delta with the spaces stripped, the
/// way real providers split tokens.
pub struct SequentialMockProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    repeat_last: Option<ProviderResponse>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::from_results(responses.into_iter().map(Ok).collect())
    }

    pub fn from_results(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            repeat_last: None,
        }
    }

    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn tool_then_answer(tool_calls: Vec<MessageToolCall>, thought: &str, answer: &str) -> Self {
        Self::new(vec![
            make_tool_call_response(tool_calls, thought),
            make_text_response(answer),
        ])
    }

    /// Requests the same tool call forever.
    pub fn always_tool(call: MessageToolCall) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            repeat_last: Some(make_tool_call_response(vec![call], "")),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        match self.script.lock().unwrap().pop_front() {
            Some(entry) => entry,
            None => self.repeat_last.clone().ok_or(ProviderError::ApiError {
                status_code: 500,
                message: "no more scripted responses".into(),
            }),
        }
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.next(request)
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamDelta, ProviderError>>, ProviderError> {
        let response = self.next(request)?;
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for word in response.message.content.split_inclusive(' ') {
                let delta = StreamDelta {
                    content: Some(word.to_string()),
                    ..Default::default()
                };
                if tx.send(Ok(delta)).await.is_err() {
                    return;
                }
            }
            let _ = tx
                .send(Ok(StreamDelta {
                    content: None,
                    tool_calls: response.message.tool_calls,
                    done: true,
                    usage: response.usage,
                }))
                .await;
        });
        Ok(rx)
    }
}

/// Streams fragments one at a time, pausing between them, and records
/// whether the consumer hung up before the end.
pub struct SlowStreamProvider {
    pub fragments: Vec<String>,
    pub delay: Duration,
    pub sent: Arc<AtomicUsize>,
    pub cancelled: Arc<AtomicBool>,
}

#[async_trait]
impl Provider for SlowStreamProvider {
    fn name(&self) -> &str {
        "slow_stream"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(make_text_response(&self.fragments.join(" ")))
    }

    async fn stream(
        &self,
        _request: ProviderRequest,
    ) -> Result<mpsc::Receiver<Result<StreamDelta, ProviderError>>, ProviderError> {
        let (tx, rx) = mpsc::channel(1);
        let fragments = self.fragments.clone();
        let delay = self.delay;
        let sent = self.sent.clone();
        let cancelled = self.cancelled.clone();
        tokio::spawn(async move {
            for fragment in fragments {
                tokio::select! {
                    _ = tx.closed() => {
                        cancelled.store(true, Ordering::SeqCst);
                        return;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                let delta = StreamDelta {
                    content: Some(fragment),
                    ..Default::default()
                };
                if tx.send(Ok(delta)).await.is_err() {
                    cancelled.store(true, Ordering::SeqCst);
                    return;
                }
                sent.fetch_add(1, Ordering::SeqCst);
            }
            let _ = tx
                .send(Ok(StreamDelta {
                    done: true,
                    ..Default::default()
                }))
                .await;
        });
        Ok(rx)
    }
}

/// Echoes its `text` argument; fails when `fail` is true.
pub struct EchoTool {
    pub calls: Arc<AtomicUsize>,
}

impl EchoTool {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo text back"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}}})
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if arguments["fail"].as_bool() == Some(true) {
            return Err(ToolError::ExecutionFailed {
                tool_name: "echo".into(),
                reason: "asked to fail".into(),
            });
        }
        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: arguments["text"].as_str().unwrap_or_default().to_string(),
            data: None,
        })
    }
}

/// Sleeps longer than any reasonable tool timeout.
pub struct SleepyTool;

#[async_trait]
impl Tool for SleepyTool {
    fn name(&self) -> &str {
        "sleepy"
    }

    fn description(&self) -> &str {
        "Never finishes in time"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: "late".into(),
            data: None,
        })
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: usage(),
        model: "mock-model".into(),
    }
}

pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_tool_calls(thought, tool_calls),
        usage: usage(),
        model: "mock-model".into(),
    }
}

pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}
