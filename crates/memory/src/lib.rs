//! Session memory and the retrieval pipeline for codehelper.
//!
//! - [`SessionMemoryStore`]: bounded per-session history
//! - [`ParagraphSplitter`], [`Ingestor`]: documents → embedded chunks
//! - [`InMemoryVectorStore`]: nearest-neighbor index
//! - [`ContentRetriever`]: top-k query with a relevance floor

pub mod embedding;
pub mod ingest;
pub mod retriever;
pub mod session;
pub mod splitter;
pub mod store;
pub mod vector;

pub use embedding::{HashingEmbedder, ProviderEmbedder};
pub use ingest::{load_documents, IngestReport, Ingestor};
pub use retriever::ContentRetriever;
pub use session::{SessionGuard, SessionMemoryStore};
pub use splitter::ParagraphSplitter;
pub use store::InMemoryVectorStore;
pub use vector::{cosine_similarity, relevance_score};
