//! `codehelper ingest`: index the knowledge base and report what was stored.

use codehelper_agent::RetrievalPipeline;
use codehelper_core::event::EventBus;
use std::path::PathBuf;

pub async fn run(dir_override: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    if config.retrieval.embedding == "provider" {
        super::require_api_key(&config)?;
    }
    let dir = dir_override.unwrap_or_else(|| config.retrieval.docs_dir.clone());

    let provider = codehelper_providers::build_from_config(&config)?;
    let pipeline = RetrievalPipeline::from_config(&config.retrieval, provider, &config.embedding_model)?;
    let report = pipeline.ingest_dir(&dir, &EventBus::default()).await?;

    println!(
        "Ingested {} document(s) from {} into {} chunk(s) ({} new)",
        report.documents,
        dir.display(),
        report.chunks,
        report.new_chunks
    );
    println!("Index holds {} chunk(s)", pipeline.chunk_count().await);
    Ok(())
}
