//! The turn pipeline of codehelper.
//!
//! A turn runs through:
//!
//! 1. **Guardrail**: reject denylisted input before anything else runs
//! 2. **Retrieval**: append relevant knowledge-base chunks to the user message
//! 3. **Session**: lock the session and load its recent history
//! 4. **Tool loop**: call the model, execute requested tools, feed results back
//! 5. **Persist**: append the user message and the final answer
//!
//! Streaming turns additionally pass model output through a
//! [`StreamReconstructor`] before it reaches the client.

pub mod assistant;
pub mod bootstrap;
pub mod model;
pub mod orchestrator;
pub mod reconstructor;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use assistant::{augment, Assistant, ChatOutcome, Report, TurnInput};
pub use bootstrap::{build_assistant, RetrievalPipeline};
pub use model::{ModelClient, ModelStream, ModelTurn, StreamItem, WorkingContext};
pub use orchestrator::{
    BlockingRound, LoopOutcome, RoundDriver, StreamingRound, ToolOrchestrator, DEFAULT_MAX_ROUNDS,
};
pub use reconstructor::{StreamChunk, StreamReconstructor};
pub use stream_event::{AssistantStreamEvent, SourceRef};
