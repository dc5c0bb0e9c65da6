//! Content retriever: top-k semantic search with a relevance floor.

use async_trait::async_trait;
use codehelper_core::error::MemoryError;
use codehelper_core::retrieval::{EmbeddingModel, RetrievalResult, Retriever, VectorStore};
use std::sync::Arc;
use tracing::debug;

/// Embeds the query with the ingestion model and keeps at most `max_results`
/// matches scoring at least `min_score`.
pub struct ContentRetriever {
    embedder: Arc<dyn EmbeddingModel>,
    store: Arc<dyn VectorStore>,
    max_results: usize,
    min_score: f32,
}

impl ContentRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingModel>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            max_results: 2,
            min_score: 0.75,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

#[async_trait]
impl Retriever for ContentRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievalResult>, MemoryError> {
        let vector = self.embedder.embed_one(query).await?;
        let mut results = self.store.query(&vector, self.max_results).await?;
        results.retain(|r| r.score >= self.min_score);
        debug!(
            matches = results.len(),
            top_score = results.first().map(|r| r.score),
            "Retrieved content"
        );
        Ok(results)
    }
}
