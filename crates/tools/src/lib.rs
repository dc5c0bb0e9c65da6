//! Tools the assistant can call during a turn.
//!
//! Local tools run in-process; remote tools are discovered from MCP servers
//! and invoked over JSON-RPC. Both end up in one [`ToolRegistry`].

pub mod interview_question;
pub mod mcp;

use codehelper_config::AppConfig;
use codehelper_core::tool::ToolRegistry;
use tracing::{info, warn};

pub use interview_question::InterviewQuestionTool;
pub use mcp::McpClient;

/// Registry with the built-in local tools enabled in `config`.
pub fn local_registry(config: &AppConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    if config.tools.interview_search {
        match InterviewQuestionTool::new() {
            Ok(tool) => {
                if let Err(e) = registry.register_local(Box::new(tool)) {
                    warn!(error = %e, "Could not register interview question tool");
                }
            }
            Err(e) => warn!(error = %e, "Interview question tool unavailable"),
        }
    }
    registry
}

/// Local tools plus everything the configured MCP servers expose.
pub async fn build_registry(config: &AppConfig) -> ToolRegistry {
    let mut registry = local_registry(config);
    let remote = mcp::discover_all(&mut registry, &config.mcp.servers).await;
    info!(tools = registry.len(), remote, "Tool registry ready");
    registry
}
