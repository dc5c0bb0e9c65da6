//! In-memory vector store.
//!
//! Chunks live in insertion order inside an `Arc<RwLock<Vec<_>>>`; queries
//! scan every entry. Fine for the document corpus of a single assistant.

use async_trait::async_trait;
use codehelper_core::error::MemoryError;
use codehelper_core::retrieval::{Chunk, RetrievalResult, VectorStore};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::vector::{cosine_similarity, relevance_score};

struct StoredChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// A vector store that keeps every chunk in memory.
#[derive(Clone, Default)]
pub struct InMemoryVectorStore {
    entries: Arc<RwLock<Vec<StoredChunk>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, chunk: Chunk, vector: Vec<f32>) -> Result<bool, MemoryError> {
        if vector.is_empty() {
            return Err(MemoryError::Storage(format!("chunk {} has an empty vector", chunk.id)));
        }

        let mut entries = self.entries.write().await;
        // Replacing in place keeps the original insertion position for tie-breaking
        if let Some(existing) = entries.iter_mut().find(|e| e.chunk.id == chunk.id) {
            existing.chunk = chunk;
            existing.vector = vector;
            return Ok(false);
        }
        entries.push(StoredChunk { chunk, vector });
        Ok(true)
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievalResult>, MemoryError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read().await;
        let mut scored: Vec<RetrievalResult> = entries
            .iter()
            .map(|e| RetrievalResult {
                chunk: e.chunk.clone(),
                score: relevance_score(cosine_similarity(&e.vector, vector)),
            })
            .collect();

        // Stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
