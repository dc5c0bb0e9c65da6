//! # codehelper core
//!
//! Domain types, traits, and error definitions for the codehelper assistant.
//! This crate carries no framework dependencies: it defines the domain model
//! every other crate implements against.
//!
//! ## Layout
//!
//! Each collaborator of a turn is a trait here, implemented elsewhere:
//! - [`Provider`] for the language model (chat, streaming, embeddings)
//! - [`Tool`] and [`RemoteToolTransport`] for local and remote tools
//! - [`EmbeddingModel`], [`VectorStore`] and [`Retriever`] for retrieval
//!
//! All crates depend inward on this one.

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, MemoryError, ProviderError, Result, ToolError, TurnError};
pub use event::{DomainEvent, EventBus};
pub use message::{Attachment, Message, MessageToolCall, Role, SessionId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamDelta, ToolDefinition};
pub use retrieval::{Chunk, Document, EmbeddingModel, RetrievalResult, Retriever, VectorStore};
pub use tool::{
    RemoteToolSpec, RemoteToolTransport, Tool, ToolCall, ToolCapability, ToolDescriptor,
    ToolRegistry, ToolResult,
};
