//! Wires an [`Assistant`] from configuration.
//!
//! Shared by the CLI and the gateway so both serve the same assistant.

use codehelper_config::{AppConfig, RetrievalConfig};
use codehelper_core::error::{Error, MemoryError};
use codehelper_core::event::{DomainEvent, EventBus};
use codehelper_core::provider::Provider;
use codehelper_core::retrieval::{EmbeddingModel, VectorStore};
use codehelper_core::tool::ToolRegistry;
use codehelper_memory::{
    ContentRetriever, HashingEmbedder, InMemoryVectorStore, IngestReport, Ingestor,
    ParagraphSplitter, ProviderEmbedder, SessionMemoryStore,
};
use codehelper_security::DenylistGuardrail;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::assistant::Assistant;
use crate::model::ModelClient;
use crate::orchestrator::ToolOrchestrator;

/// Embedder, vector store, ingestor and retriever sharing one index.
pub struct RetrievalPipeline {
    ingestor: Ingestor,
    retriever: Arc<ContentRetriever>,
    store: Arc<InMemoryVectorStore>,
}

impl RetrievalPipeline {
    pub fn from_config(
        config: &RetrievalConfig,
        provider: Arc<dyn Provider>,
        embedding_model: &str,
    ) -> Result<Self, Error> {
        let embedder: Arc<dyn EmbeddingModel> = match config.embedding.as_str() {
            "hashing" => Arc::new(HashingEmbedder::new(config.hashing_dimensions)),
            "provider" => Arc::new(ProviderEmbedder::new(provider, embedding_model)),
            other => {
                return Err(Error::Config {
                    message: format!("unknown embedding backend '{other}' (expected 'provider' or 'hashing')"),
                });
            }
        };

        let store = Arc::new(InMemoryVectorStore::new());
        let ingestor = Ingestor::new(
            ParagraphSplitter::new(config.chunk_size, config.chunk_overlap),
            embedder.clone(),
            store.clone(),
        );
        let retriever = Arc::new(
            ContentRetriever::new(embedder, store.clone())
                .with_max_results(config.max_results)
                .with_min_score(config.min_score),
        );

        Ok(Self {
            ingestor,
            retriever,
            store,
        })
    }

    pub fn retriever(&self) -> Arc<ContentRetriever> {
        Arc::clone(&self.retriever)
    }

    pub async fn chunk_count(&self) -> usize {
        self.store.len().await
    }

    /// Ingest every document in `dir` and announce the result on the bus.
    pub async fn ingest_dir(&self, dir: &Path, event_bus: &EventBus) -> Result<IngestReport, MemoryError> {
        let report = self.ingestor.ingest_dir(dir).await?;
        event_bus.publish(DomainEvent::DocumentsIngested {
            documents: report.documents,
            chunks: report.chunks,
            timestamp: chrono::Utc::now(),
        });
        Ok(report)
    }
}

/// Build the assistant, ingesting the configured document directory.
///
/// Ingestion problems are logged and leave retrieval with whatever was
/// indexed; they never prevent startup.
pub async fn build_assistant(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    event_bus: Arc<EventBus>,
) -> Result<Assistant, Error> {
    let guardrail = DenylistGuardrail::from_config(&config.guardrail).map_err(|e| Error::Config {
        message: e.to_string(),
    })?;
    let system_prompt = config.resolve_system_prompt().map_err(|e| Error::Config {
        message: e.to_string(),
    })?;

    let model = ModelClient::new(provider.clone(), &config.model)
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);
    let orchestrator = ToolOrchestrator::new(Arc::new(tools), event_bus.clone())
        .with_max_rounds(config.tools.max_rounds)
        .with_tool_timeout(Duration::from_secs(config.tools.timeout_secs));
    let sessions = Arc::new(SessionMemoryStore::new(config.memory.window));

    let mut assistant = Assistant::new(model, orchestrator, sessions, event_bus.clone())
        .with_guardrail(Arc::new(guardrail))
        .with_system_prompt(system_prompt);

    if config.retrieval.enabled {
        let pipeline = RetrievalPipeline::from_config(&config.retrieval, provider, &config.embedding_model)?;
        let docs_dir = &config.retrieval.docs_dir;
        if docs_dir.is_dir() {
            match pipeline.ingest_dir(docs_dir, &event_bus).await {
                Ok(report) => info!(
                    dir = %docs_dir.display(),
                    documents = report.documents,
                    chunks = report.chunks,
                    "Knowledge base ready"
                ),
                Err(e) => warn!(dir = %docs_dir.display(), error = %e, "Document ingestion failed"),
            }
        } else {
            warn!(dir = %docs_dir.display(), "Document directory not found, retrieval index is empty");
        }
        assistant = assistant.with_retriever(pipeline.retriever());
    }

    info!(
        model = %config.model,
        tools = assistant.tool_definitions().len(),
        window = config.memory.window,
        retrieval = config.retrieval.enabled,
        "Assistant ready"
    );
    Ok(assistant)
}
