//! The per-turn pipeline.
//!
//! guardrail → retrieval → session lock + history → tool loop → append.
//!
//! What ends up in session history depends on how the turn ended:
//! - final answer: the user message (as typed) and the answer
//! - tool loop exceeded: the user message only
//! - guardrail rejection, model error, stream transport error: nothing

use codehelper_core::error::TurnError;
use codehelper_core::event::{DomainEvent, EventBus};
use codehelper_core::message::{Attachment, Message, SessionId};
use codehelper_core::provider::ToolDefinition;
use codehelper_core::retrieval::{RetrievalResult, Retriever};
use codehelper_memory::SessionMemoryStore;
use codehelper_security::{GuardrailVerdict, InputGuardrail};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::model::{ModelClient, WorkingContext};
use crate::orchestrator::{LoopOutcome, ToolOrchestrator};
use crate::stream_event::{AssistantStreamEvent, SourceRef};

const STREAM_BUFFER: usize = 64;

const REPORT_INSTRUCTIONS: &str = "Reply with a single JSON object and nothing else, shaped as \
{\"name\": \"<the user's name, or empty>\", \"suggestionList\": [\"<one concrete learning suggestion>\", ...]}.";

/// One user turn.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub session_id: SessionId,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl TurnInput {
    pub fn new(session_id: impl Into<SessionId>, text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.attachments.push(Attachment::Image { url: url.into() });
        self
    }

    fn user_message(&self, text: &str) -> Message {
        self.attachments
            .iter()
            .cloned()
            .fold(Message::user(text), Message::with_attachment)
    }
}

/// Answer of a completed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub session_id: SessionId,
    pub answer: String,
    pub rounds: usize,
    pub sources: Vec<SourceRef>,
}

/// Structured learning report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "suggestion_list")]
    pub suggestion_list: Vec<String>,
}

impl Report {
    /// Parse a model answer, tolerating a surrounding Markdown code fence.
    pub fn parse(answer: &str) -> Result<Self, TurnError> {
        let body = strip_code_fence(answer);
        serde_json::from_str(body).map_err(|e| TurnError::MalformedReport(format!("{e}: {answer}")))
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Append retrieved chunks to the user's text as reference material.
pub fn augment(user_text: &str, results: &[RetrievalResult]) -> String {
    if results.is_empty() {
        return user_text.to_string();
    }
    let contents: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
    format!(
        "{user_text}\n\nAnswer using the following information:\n{}",
        contents.join("\n\n")
    )
}

/// The conversational assistant: one instance serves every session.
pub struct Assistant {
    model: ModelClient,
    orchestrator: ToolOrchestrator,
    sessions: Arc<SessionMemoryStore>,
    guardrail: Option<Arc<dyn InputGuardrail>>,
    retriever: Option<Arc<dyn Retriever>>,
    system_prompt: String,
    event_bus: Arc<EventBus>,
}

impl Assistant {
    pub fn new(
        model: ModelClient,
        orchestrator: ToolOrchestrator,
        sessions: Arc<SessionMemoryStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            model,
            orchestrator,
            sessions,
            guardrail: None,
            retriever: None,
            system_prompt: codehelper_config::DEFAULT_SYSTEM_PROMPT.to_string(),
            event_bus,
        }
    }

    pub fn with_guardrail(mut self, guardrail: Arc<dyn InputGuardrail>) -> Self {
        self.guardrail = Some(guardrail);
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn model(&self) -> &ModelClient {
        &self.model
    }

    pub fn sessions(&self) -> &SessionMemoryStore {
        &self.sessions
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.orchestrator.tools().definitions()
    }

    pub async fn history(&self, session_id: &SessionId) -> Vec<Message> {
        self.sessions.get(session_id).await
    }

    fn check_input(&self, input: &TurnInput) -> Result<(), TurnError> {
        let Some(guardrail) = &self.guardrail else {
            return Ok(());
        };
        match guardrail.validate(&input.text) {
            GuardrailVerdict::Pass => Ok(()),
            GuardrailVerdict::Fail { reason } => {
                self.event_bus.publish(DomainEvent::GuardrailRejected {
                    session_id: input.session_id.to_string(),
                    reason: reason.clone(),
                    timestamp: chrono::Utc::now(),
                });
                Err(TurnError::GuardrailRejected { reason })
            }
        }
    }

    /// Retrieval never fails a turn; errors degrade to no augmentation.
    async fn retrieve(&self, input: &TurnInput) -> Vec<RetrievalResult> {
        let Some(retriever) = &self.retriever else {
            return Vec::new();
        };
        match retriever.retrieve(&input.text).await {
            Ok(results) => results,
            Err(e) => {
                warn!(session_id = %input.session_id, error = %e, "Retrieval failed, continuing without context");
                self.event_bus.publish(DomainEvent::RetrievalDegraded {
                    session_id: input.session_id.to_string(),
                    error_message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                Vec::new()
            }
        }
    }

    async fn run_turn<F, Fut>(
        &self,
        input: &TurnInput,
        system_prompt: &str,
        drive: F,
    ) -> Result<ChatOutcome, TurnError>
    where
        F: FnOnce(WorkingContext) -> Fut,
        Fut: std::future::Future<Output = Result<LoopOutcome, TurnError>>,
    {
        self.check_input(input)?;
        let results = self.retrieve(input).await;
        debug!(session_id = %input.session_id, chunks = results.len(), "Context assembled");

        let mut session = self.sessions.lock(&input.session_id).await;
        let ctx = WorkingContext::new(
            system_prompt,
            session.history(),
            input.user_message(&augment(&input.text, &results)),
        );

        match drive(ctx).await {
            Ok(outcome) => {
                session.append(input.user_message(&input.text));
                session.append(Message::assistant(&outcome.answer));
                info!(
                    session_id = %input.session_id,
                    rounds = outcome.rounds,
                    sources = results.len(),
                    "Turn complete"
                );
                self.event_bus.publish(DomainEvent::ResponseGenerated {
                    session_id: input.session_id.to_string(),
                    model: self.model.model().to_string(),
                    rounds: outcome.rounds,
                    timestamp: chrono::Utc::now(),
                });
                Ok(ChatOutcome {
                    session_id: input.session_id.clone(),
                    answer: outcome.answer,
                    rounds: outcome.rounds,
                    sources: results.iter().map(SourceRef::from).collect(),
                })
            }
            Err(e) => {
                if matches!(e, TurnError::ToolLoopExceeded { .. }) {
                    session.append(input.user_message(&input.text));
                }
                error!(session_id = %input.session_id, error = %e, "Turn failed");
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: format!("session {}", input.session_id),
                    error_message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                Err(e)
            }
        }
    }

    /// Run a turn to completion.
    pub async fn chat(&self, input: TurnInput) -> Result<ChatOutcome, TurnError> {
        self.run_turn(&input, &self.system_prompt, |mut ctx| async move {
            self.orchestrator.complete(&self.model, &mut ctx).await
        })
        .await
    }

    /// Ask for a structured learning report.
    pub async fn report(&self, input: TurnInput) -> Result<Report, TurnError> {
        let prompt = format!("{}\n\n{REPORT_INSTRUCTIONS}", self.system_prompt);
        let model = self.model.clone().with_json_mode(true);
        let outcome = self
            .run_turn(&input, &prompt, |mut ctx| async move {
                self.orchestrator.complete(&model, &mut ctx).await
            })
            .await?;
        Report::parse(&outcome.answer)
    }

    /// Run a turn in the background, streaming events as they happen.
    ///
    /// The stream always ends with exactly one `done` or `error` event,
    /// unless the receiver is dropped first, which cancels the turn.
    pub fn chat_stream(self: &Arc<Self>, input: TurnInput) -> mpsc::Receiver<AssistantStreamEvent> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let (orchestrator, model, events) = (&this.orchestrator, &this.model, &tx);
            let result = this
                .run_turn(&input, &this.system_prompt, |mut ctx| async move {
                    orchestrator.stream(model, &mut ctx, events).await
                })
                .await;

            let terminal = match result {
                Ok(outcome) => AssistantStreamEvent::Done {
                    session_id: outcome.session_id.to_string(),
                    answer: outcome.answer,
                    rounds: outcome.rounds,
                    sources: outcome.sources,
                },
                Err(TurnError::StreamTransport(reason)) => {
                    debug!(session_id = %input.session_id, reason = %reason, "Stream abandoned");
                    return;
                }
                Err(e) => AssistantStreamEvent::Error {
                    message: e.to_string(),
                },
            };
            let _ = tx.send(terminal).await;
        });
        rx
    }
}
