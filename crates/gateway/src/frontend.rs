//! Routes consumed by the browser front end.
//!
//! `GET /api/ai/chat?memoryId=<int>&message=<text>` streams the answer as
//! `data: {"chunk": "..."}` events. Chunks are JSON-wrapped so leading spaces
//! survive SSE framing. The stream closes after the last chunk; a failed
//! turn sends one `error` event first.

use axum::{
    Router,
    extract::{Query, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::get,
};
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use codehelper_agent::{AssistantStreamEvent, TurnInput};

use crate::api_v1::SharedApiState;

#[derive(Deserialize)]
struct ChatQuery {
    #[serde(rename = "memoryId")]
    memory_id: u64,
    message: String,
}

/// Build the front-end router.
pub fn frontend_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/api/ai/chat", get(chat_sse_handler))
        .with_state(state)
}

fn to_sse(event: AssistantStreamEvent) -> Option<SseEvent> {
    match event {
        AssistantStreamEvent::Chunk { content } => {
            let data = serde_json::json!({ "chunk": content }).to_string();
            Some(SseEvent::default().data(data))
        }
        AssistantStreamEvent::Error { message } => {
            let data = serde_json::json!({ "error": message }).to_string();
            Some(SseEvent::default().event("error").data(data))
        }
        _ => None,
    }
}

async fn chat_sse_handler(
    State(state): State<SharedApiState>,
    Query(query): Query<ChatQuery>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    info!(memory_id = query.memory_id, "api/ai/chat SSE request");

    let rx = state
        .assistant
        .chat_stream(TurnInput::new(query.memory_id, query.message));
    let stream = ReceiverStream::new(rx).filter_map(|event| to_sse(event).map(Ok));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_v1::ApiV1State;
    use crate::test_support::{assistant_with, MockProvider};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app(provider: MockProvider) -> (Router, SharedApiState) {
        let state = Arc::new(ApiV1State {
            assistant: assistant_with(provider).await,
            start_time: chrono::Utc::now(),
        });
        (frontend_router(state.clone()), state)
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn streams_json_wrapped_chunks() {
        let (app, state) = app(MockProvider::new("Use a HashMap.")).await;
        let (status, body) = get_body(app, "/api/ai/chat?memoryId=42&message=how%20to%20count").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"data: {"chunk":"Use a HashMap."}"#));
        assert!(!body.contains("event: error"));
        assert!(!body.contains("done"));

        let history = state.assistant.history(&42u64.into()).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "how to count");
    }

    #[tokio::test]
    async fn rejected_input_sends_error_event() {
        let (app, _) = app(MockProvider::new("unused")).await;
        let (status, body) = get_body(app, "/api/ai/chat?memoryId=1&message=evil%20plan").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("event: error"));
        assert!(body.contains("Sensitive word detected: evil"));
        assert!(!body.contains("chunk"));
    }

    #[tokio::test]
    async fn non_numeric_memory_id_is_rejected() {
        let (app, _) = app(MockProvider::new("unused")).await;
        let (status, _) = get_body(app, "/api/ai/chat?memoryId=abc&message=hi").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn chunk_keeps_leading_space() {
        let event = to_sse(AssistantStreamEvent::Chunk { content: " world".into() });
        assert!(event.is_some());
        assert!(to_sse(AssistantStreamEvent::ToolCall {
            id: "c".into(),
            name: "t".into(),
            input: serde_json::Value::Null,
        })
        .is_none());
    }
}
