//! Turn-level streaming events.
//!
//! `AssistantStreamEvent` is what the gateway forwards to clients over SSE:
//! - `chunk`: reconstructed text fragment
//! - `tool_call`: the model asked for a tool
//! - `tool_result`: the tool finished (or failed)
//! - `done`: final answer and retrieval sources
//! - `error`: the turn failed; nothing follows

use codehelper_core::retrieval::RetrievalResult;
use serde::{Deserialize, Serialize};

/// A retrieval hit as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: String,
    pub score: f32,
    pub excerpt: String,
}

impl From<&RetrievalResult> for SourceRef {
    fn from(result: &RetrievalResult) -> Self {
        let excerpt: String = result.chunk.text.chars().take(200).collect();
        Self {
            source: result.chunk.source.clone(),
            score: result.score,
            excerpt,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantStreamEvent {
    Chunk { content: String },

    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    ToolResult {
        id: String,
        name: String,
        output: String,
        success: bool,
    },

    Done {
        session_id: String,
        answer: String,
        rounds: usize,
        sources: Vec<SourceRef>,
    },

    Error { message: String },
}

impl AssistantStreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codehelper_core::retrieval::Chunk;

    #[test]
    fn chunk_serializes_with_type_tag() {
        let event = AssistantStreamEvent::Chunk {
            content: " world".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"chunk","content":" world"}"#);
    }

    #[test]
    fn done_carries_sources() {
        let event = AssistantStreamEvent::Done {
            session_id: "7".into(),
            answer: "ok".into(),
            rounds: 2,
            sources: vec![SourceRef {
                source: "java.md".into(),
                score: 0.9,
                excerpt: "java.md\nJVM".into(),
            }],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "done");
        assert_eq!(json["sources"][0]["source"], "java.md");
        assert!(event.is_terminal());
    }

    #[test]
    fn event_type_names() {
        assert_eq!(AssistantStreamEvent::Chunk { content: "x".into() }.event_type(), "chunk");
        assert_eq!(
            AssistantStreamEvent::ToolCall {
                id: "a".into(),
                name: "b".into(),
                input: serde_json::Value::Null
            }
            .event_type(),
            "tool_call"
        );
        assert_eq!(
            AssistantStreamEvent::ToolResult {
                id: "a".into(),
                name: "b".into(),
                output: "c".into(),
                success: true
            }
            .event_type(),
            "tool_result"
        );
        assert_eq!(AssistantStreamEvent::Error { message: "x".into() }.event_type(), "error");
    }

    #[test]
    fn source_excerpt_is_truncated() {
        let result = RetrievalResult {
            chunk: Chunk {
                id: "id".into(),
                source: "long.md".into(),
                index: 0,
                text: "x".repeat(1000),
                metadata: Default::default(),
            },
            score: 0.8,
        };
        let source = SourceRef::from(&result);
        assert_eq!(source.excerpt.chars().count(), 200);
        assert_eq!(source.source, "long.md");
    }

    #[test]
    fn event_deserialization() {
        let event: AssistantStreamEvent =
            serde_json::from_str(r#"{"type":"error","message":"boom"}"#).unwrap();
        assert!(matches!(event, AssistantStreamEvent::Error { message } if message == "boom"));
    }
}
