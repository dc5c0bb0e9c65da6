//! Embedding models for the retrieval pipeline.
//!
//! - [`ProviderEmbedder`] calls the model provider's embedding endpoint.
//! - [`HashingEmbedder`] is an offline bag-of-words model based on feature
//!   hashing. It needs no network and is deterministic, which makes it the
//!   fallback when no embedding endpoint is available.

use async_trait::async_trait;
use codehelper_core::error::MemoryError;
use codehelper_core::provider::{EmbeddingRequest, Provider};
use codehelper_core::retrieval::EmbeddingModel;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

/// Inputs sent per embedding request.
const BATCH_SIZE: usize = 16;

/// Embeds text through a [`Provider`].
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl EmbeddingModel for ProviderEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            debug!(model = %self.model, count = batch.len(), "Embedding batch");
            let response = self
                .provider
                .embed(EmbeddingRequest {
                    model: self.model.clone(),
                    inputs: batch.to_vec(),
                })
                .await
                .map_err(|e| MemoryError::EmbeddingFailed(e.to_string()))?;
            vectors.extend(response.embeddings);
        }
        Ok(vectors)
    }
}

/// Offline feature-hashing embedder.
///
/// Tokens are lowercased alphanumeric runs; every CJK character is its own
/// token. Each token adds ±1 to one of `dimensions` buckets chosen by SHA-256.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(8),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(512)
    }
}

#[async_trait]
impl EmbeddingModel for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, MemoryError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for c in text.chars() {
        if is_cjk(c) {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            tokens.push(c.to_string());
        } else if c.is_alphanumeric() {
            word.extend(c.to_lowercase());
        } else if !word.is_empty() {
            tokens.push(std::mem::take(&mut word));
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF      // Hiragana, Katakana
        | 0x3400..=0x4DBF    // CJK Extension A
        | 0x4E00..=0x9FFF    // CJK Unified Ideographs
        | 0xAC00..=0xD7AF    // Hangul Syllables
        | 0xF900..=0xFAFF    // CJK Compatibility Ideographs
        | 0x20000..=0x2A6DF  // CJK Extension B
    )
}
