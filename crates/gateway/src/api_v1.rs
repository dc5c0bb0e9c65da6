//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST /v1/chat`           : send a message, get the answer and its sources
//! - `POST /v1/chat/stream`    : send a message, get an SSE stream of typed events
//! - `POST /v1/report`         : structured learning report
//! - `GET  /v1/tools`          : list registered tools
//! - `GET  /v1/sessions/{id}`  : session history

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use codehelper_agent::{Assistant, ChatOutcome, Report, TurnInput};
use codehelper_core::error::TurnError;
use codehelper_core::message::{Role, SessionId};

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub assistant: Arc<Assistant>,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

pub type SharedApiState = Arc<ApiV1State>;

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .route("/report", post(report_handler))
        .route("/tools", get(list_tools_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct ChatRequest {
    /// Omit to start a fresh session.
    #[serde(default)]
    session_id: Option<String>,
    message: String,
    #[serde(default)]
    image_url: Option<String>,
}

impl ChatRequest {
    fn into_input(self) -> TurnInput {
        let session_id = self.session_id.map(SessionId::from).unwrap_or_default();
        let input = TurnInput::new(session_id, self.message);
        match self.image_url {
            Some(url) => input.with_image(url),
            None => input,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct ToolListResponse {
    tools: Vec<ToolDto>,
    count: usize,
}

#[derive(Serialize, Deserialize)]
struct ToolDto {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct SessionResponse {
    session_id: String,
    messages: Vec<MessageDto>,
}

#[derive(Serialize, Deserialize)]
struct MessageDto {
    role: String,
    content: String,
    timestamp: String,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a failed turn to an HTTP status.
pub(crate) fn turn_error_response(e: TurnError) -> ApiError {
    let status = match &e {
        TurnError::GuardrailRejected { .. } => StatusCode::BAD_REQUEST,
        TurnError::Model(_) | TurnError::ToolLoopExceeded { .. } | TurnError::MalformedReport(_) => {
            StatusCode::BAD_GATEWAY
        }
        TurnError::StreamTransport(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatOutcome>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    let input = payload.into_input();
    info!(session_id = %input.session_id, "v1/chat request");

    state
        .assistant
        .chat(input)
        .await
        .map(Json)
        .map_err(turn_error_response)
}

/// `POST /v1/chat/stream`: one SSE event per [`codehelper_agent::AssistantStreamEvent`].
async fn chat_stream_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    let input = payload.into_input();
    info!(session_id = %input.session_id, "v1/chat/stream SSE request");

    let rx = state.assistant.chat_stream(input);
    let stream = ReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event.event_type()).data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn report_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<Report>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    let input = payload.into_input();
    info!(session_id = %input.session_id, "v1/report request");
    state
        .assistant
        .report(input)
        .await
        .map(Json)
        .map_err(turn_error_response)
}

async fn list_tools_handler(State(state): State<SharedApiState>) -> Json<ToolListResponse> {
    let defs = state.assistant.tool_definitions();
    let count = defs.len();

    Json(ToolListResponse {
        tools: defs
            .into_iter()
            .map(|d| ToolDto {
                name: d.name,
                description: d.description,
                parameters: d.parameters,
            })
            .collect(),
        count,
    })
}

async fn get_session_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Json<SessionResponse> {
    let history = state.assistant.history(&SessionId::from(id.as_str())).await;
    Json(SessionResponse {
        session_id: id,
        messages: history
            .into_iter()
            .map(|m| MessageDto {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                    Role::Tool => "tool",
                }
                .into(),
                content: m.content,
                timestamp: m.timestamp.to_rfc3339(),
            })
            .collect(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────
