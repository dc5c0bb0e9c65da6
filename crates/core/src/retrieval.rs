//! Retrieval domain types and traits.
//!
//! Documents are split into chunks at ingestion time; each chunk carries its
//! own embedding inside a [`VectorStore`]. At query time a [`Retriever`]
//! returns the best chunks above a relevance threshold.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;

/// A raw source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Source identifier, typically the file name.
    pub source: String,

    /// Full text.
    pub text: String,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
            metadata: serde_json::Map::new(),
        }
    }
}

/// A bounded slice of a document, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Content-derived identifier; identical chunks share an id.
    pub id: String,

    /// Source identifier of the owning document.
    pub source: String,

    /// Position of this chunk within its document.
    pub index: usize,

    /// Chunk text as embedded (prefixed with the source identifier).
    pub text: String,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A chunk plus its relevance score in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// Turns text into vectors. Queries and chunks must use the same model.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    fn name(&self) -> &str;

    /// Embed a batch of texts, one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, MemoryError>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> std::result::Result<Vec<f32>, MemoryError> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::EmbeddingFailed("empty embedding response".into()))
    }
}

/// Nearest-neighbor index over chunk embeddings.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert a chunk, or replace the stored one with the same id.
    /// Returns `true` if the chunk was new.
    async fn upsert(&self, chunk: Chunk, vector: Vec<f32>) -> std::result::Result<bool, MemoryError>;

    /// Return up to `k` matches ranked by descending score; equal scores keep
    /// insertion order.
    async fn query(&self, vector: &[f32], k: usize) -> std::result::Result<Vec<RetrievalResult>, MemoryError>;

    /// Number of stored chunks.
    async fn len(&self) -> usize;
}

/// Answers a query with relevant chunks. An empty result is a valid answer.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> std::result::Result<Vec<RetrievalResult>, MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingModel for LengthEmbedder {
        fn name(&self) -> &str {
            "length"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    #[tokio::test]
    async fn embed_one_takes_the_single_vector() {
        let v = LengthEmbedder.embed_one("abcd").await.unwrap();
        assert_eq!(v, vec![4.0]);
    }

    #[test]
    fn document_new_has_empty_metadata() {
        let doc = Document::new("guide.md", "text");
        assert_eq!(doc.source, "guide.md");
        assert!(doc.metadata.is_empty());
    }
}
