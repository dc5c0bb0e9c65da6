//! Document loading and ingestion into a vector store.
//!
//! Chunk text is prefixed with the source identifier before embedding, and
//! chunk ids are derived from that text, so re-ingesting an unchanged corpus
//! replaces chunks instead of duplicating them.

use codehelper_core::error::MemoryError;
use codehelper_core::retrieval::{Chunk, Document, EmbeddingModel, VectorStore};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::splitter::ParagraphSplitter;

/// Load every UTF-8 file directly inside `dir` (not recursive), sorted by name.
pub async fn load_documents(dir: &Path) -> Result<Vec<Document>, MemoryError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| MemoryError::IngestionFailed {
        source_id: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut documents = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| MemoryError::IngestionFailed {
        source_id: dir.display().to_string(),
        reason: e.to_string(),
    })? {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }

        let source = entry.file_name().to_string_lossy().into_owned();
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                let mut doc = Document::new(&source, text);
                doc.metadata.insert(
                    "absolute_path".into(),
                    serde_json::Value::String(path.display().to_string()),
                );
                documents.push(doc);
            }
            Err(e) => warn!(file = %path.display(), error = %e, "Skipping unreadable document"),
        }
    }

    documents.sort_by(|a, b| a.source.cmp(&b.source));
    debug!(dir = %dir.display(), count = documents.len(), "Loaded documents");
    Ok(documents)
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    /// Chunks that were not already in the store.
    pub new_chunks: usize,
}

/// Splits, embeds and stores documents.
pub struct Ingestor {
    splitter: ParagraphSplitter,
    embedder: Arc<dyn EmbeddingModel>,
    store: Arc<dyn VectorStore>,
}

impl Ingestor {
    pub fn new(
        splitter: ParagraphSplitter,
        embedder: Arc<dyn EmbeddingModel>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            splitter,
            embedder,
            store,
        }
    }

    /// Split a document into source-prefixed chunks.
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.splitter
            .split(&document.text)
            .into_iter()
            .enumerate()
            .map(|(index, segment)| {
                let text = format!("{}\n{}", document.source, segment);
                let mut metadata = document.metadata.clone();
                metadata.insert("file_name".into(), serde_json::Value::String(document.source.clone()));
                metadata.insert("index".into(), serde_json::Value::from(index));
                Chunk {
                    id: chunk_id(&text),
                    source: document.source.clone(),
                    index,
                    text,
                    metadata,
                }
            })
            .collect()
    }

    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestReport, MemoryError> {
        let mut report = IngestReport {
            documents: documents.len(),
            ..IngestReport::default()
        };

        for document in documents {
            let chunks = self.chunk_document(document);
            if chunks.is_empty() {
                debug!(source = %document.source, "Document has no content");
                continue;
            }

            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != chunks.len() {
                return Err(MemoryError::EmbeddingFailed(format!(
                    "{}: expected {} vectors, got {}",
                    document.source,
                    chunks.len(),
                    vectors.len()
                )));
            }

            for (chunk, vector) in chunks.into_iter().zip(vectors) {
                report.chunks += 1;
                if self.store.upsert(chunk, vector).await? {
                    report.new_chunks += 1;
                }
            }
        }

        info!(
            documents = report.documents,
            chunks = report.chunks,
            new_chunks = report.new_chunks,
            embedder = %self.embedder.name(),
            "Ingestion complete"
        );
        Ok(report)
    }

    /// Load a directory and ingest it.
    pub async fn ingest_dir(&self, dir: &Path) -> Result<IngestReport, MemoryError> {
        let documents = load_documents(dir).await?;
        self.ingest(&documents).await
    }
}

fn chunk_id(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
