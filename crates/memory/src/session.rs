//! Session memory store: bounded per-session conversation history.
//!
//! Each session owns a FIFO window of at most `W` messages. Sessions are
//! created lazily on first access and never destroyed. A whole turn holds the
//! session's lock through [`SessionMemoryStore::lock`], so turns on one
//! session are serialized while different sessions proceed concurrently.

use codehelper_core::message::{Message, SessionId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

type History = VecDeque<Message>;

pub struct SessionMemoryStore {
    window: usize,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<History>>>>,
}

impl SessionMemoryStore {
    /// Create a store retaining at most `window` messages per session.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    async fn slot(&self, id: &SessionId) -> Arc<Mutex<History>> {
        if let Some(slot) = self.sessions.read().await.get(id) {
            return Arc::clone(slot);
        }
        let mut sessions = self.sessions.write().await;
        let slot = sessions.entry(id.clone()).or_insert_with(|| {
            debug!(session_id = %id, "Creating session");
            Arc::new(Mutex::new(VecDeque::new()))
        });
        Arc::clone(slot)
    }

    /// Take exclusive access to a session for the duration of a turn.
    pub async fn lock(&self, id: &SessionId) -> SessionGuard {
        let history = self.slot(id).await.lock_owned().await;
        SessionGuard {
            id: id.clone(),
            window: self.window,
            history,
        }
    }

    /// Snapshot of a session's history, oldest first. Unknown sessions read
    /// as empty and are not created.
    pub async fn get(&self, id: &SessionId) -> Vec<Message> {
        let slot = self.sessions.read().await.get(id).map(Arc::clone);
        match slot {
            Some(slot) => slot.lock().await.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Append one message, evicting the oldest beyond the window.
    pub async fn append(&self, id: &SessionId, message: Message) {
        self.lock(id).await.append(message);
    }

    /// Number of sessions seen so far.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Exclusive handle on one session's history.
pub struct SessionGuard {
    id: SessionId,
    window: usize,
    history: OwnedMutexGuard<History>,
}

impl SessionGuard {
    pub fn session_id(&self) -> &SessionId {
        &self.id
    }

    pub fn history(&self) -> Vec<Message> {
        self.history.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn append(&mut self, message: Message) {
        self.history.push_back(message);
        while self.history.len() > self.window {
            self.history.pop_front();
        }
    }
}
