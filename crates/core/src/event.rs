//! Domain event system: decoupled observation of what turns are doing.
//!
//! Events are published when something interesting happens in a turn.
//! Other components can subscribe to react without tight coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Something a turn did that observers may care about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// The assistant produced a final answer for a turn
    ResponseGenerated {
        session_id: String,
        model: String,
        rounds: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The input guardrail vetoed a turn
    GuardrailRejected {
        session_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Retrieval failed and the turn continued without augmentation
    RetrievalDegraded {
        session_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// Documents were ingested into the vector store
    DocumentsIngested {
        documents: usize,
        chunks: usize,
        timestamp: DateTime<Utc>,
    },

    /// An error aborted a turn
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Session the event belongs to, if it is turn-scoped.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::ResponseGenerated { session_id, .. }
            | Self::GuardrailRejected { session_id, .. }
            | Self::RetrievalDegraded { session_id, .. } => Some(session_id),
            Self::ToolExecuted { .. } | Self::DocumentsIngested { .. } | Self::ErrorOccurred { .. } => None,
        }
    }
}

/// Broadcast bus for [`DomainEvent`]s. Slow subscribers lag and lose
/// the oldest events; publishers never block.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// `capacity` events are buffered per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
