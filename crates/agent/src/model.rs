//! Model client: turns provider responses into [`ModelTurn`]s.

use codehelper_core::error::ProviderError;
use codehelper_core::message::{Message, MessageToolCall};
use codehelper_core::provider::{Provider, ProviderRequest, StreamDelta, ToolDefinition};
use codehelper_core::tool::ToolCall;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Everything the model sees for one round of a turn.
#[derive(Debug, Clone)]
pub struct WorkingContext {
    pub system_prompt: String,
    pub history: Vec<Message>,
    /// The user message, already augmented with retrieved content.
    pub user_message: Message,
    /// Assistant tool-call messages and tool results from earlier rounds.
    pub continuation: Vec<Message>,
}

impl WorkingContext {
    pub fn new(system_prompt: impl Into<String>, history: Vec<Message>, user_message: Message) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            history,
            user_message,
            continuation: Vec::new(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.continuation.push(message);
    }

    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + self.continuation.len() + 2);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(self.history.iter().cloned());
        messages.push(self.user_message.clone());
        messages.extend(self.continuation.iter().cloned());
        messages
    }
}

/// What the model decided to do this round.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    FinalAnswer(String),
    ToolCallRequest(Vec<ToolCall>),
}

/// Parse a provider tool call. Arguments that are not valid JSON are passed
/// through as a string so the tool can report the problem back to the model.
pub fn to_tool_call(call: &MessageToolCall) -> ToolCall {
    let arguments = if call.arguments.trim().is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str(&call.arguments)
            .unwrap_or_else(|_| serde_json::Value::String(call.arguments.clone()))
    };
    ToolCall {
        id: call.id.clone(),
        name: call.name.clone(),
        arguments,
    }
}

/// Inverse of [`to_tool_call`], for replaying a request into the context.
pub fn to_message_call(call: &ToolCall) -> MessageToolCall {
    let arguments = match &call.arguments {
        serde_json::Value::String(raw) => raw.clone(),
        other => other.to_string(),
    };
    MessageToolCall {
        id: call.id.clone(),
        name: call.name.clone(),
        arguments,
    }
}

/// One item of a streamed model response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// Raw text fragment, untrimmed.
    Fragment(String),
    ToolCalls(Vec<ToolCall>),
}

/// Streamed response from [`ModelClient::stream_complete`].
///
/// Dropping it closes the underlying channel, which stops the provider.
pub struct ModelStream {
    rx: mpsc::Receiver<Result<StreamDelta, ProviderError>>,
    pending: VecDeque<StreamItem>,
    finished: bool,
}

impl ModelStream {
    pub fn new(rx: mpsc::Receiver<Result<StreamDelta, ProviderError>>) -> Self {
        Self {
            rx,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Next item, or `None` once the provider is done.
    pub async fn next(&mut self) -> Option<Result<StreamItem, ProviderError>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(Ok(item));
            }
            if self.finished {
                return None;
            }
            let delta = match self.rx.recv().await? {
                Ok(delta) => delta,
                Err(e) => return Some(Err(e)),
            };
            if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                self.pending.push_back(StreamItem::Fragment(content));
            }
            if !delta.tool_calls.is_empty() {
                self.pending.push_back(StreamItem::ToolCalls(
                    delta.tool_calls.iter().map(to_tool_call).collect(),
                ));
            }
            if delta.done {
                self.finished = true;
            }
        }
    }
}

/// Provider plus the sampling settings used for every request.
#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    json_mode: bool,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            json_mode: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Ask for a JSON object as the final answer.
    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn request(&self, ctx: &WorkingContext, tools: &[ToolDefinition], stream: bool) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages: ctx.to_messages(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: tools.to_vec(),
            stream,
            json_mode: self.json_mode,
        }
    }

    pub async fn complete(
        &self,
        ctx: &WorkingContext,
        tools: &[ToolDefinition],
    ) -> Result<ModelTurn, ProviderError> {
        let response = self.provider.complete(self.request(ctx, tools, false)).await?;
        debug!(
            model = %response.model,
            tool_calls = response.message.tool_calls.len(),
            total_tokens = response.usage.as_ref().map(|u| u.total_tokens),
            "Model responded"
        );

        if response.message.tool_calls.is_empty() {
            Ok(ModelTurn::FinalAnswer(response.message.content))
        } else {
            Ok(ModelTurn::ToolCallRequest(
                response.message.tool_calls.iter().map(to_tool_call).collect(),
            ))
        }
    }

    pub async fn stream_complete(
        &self,
        ctx: &WorkingContext,
        tools: &[ToolDefinition],
    ) -> Result<ModelStream, ProviderError> {
        let rx = self.provider.stream(self.request(ctx, tools, true)).await?;
        Ok(ModelStream::new(rx))
    }
}
