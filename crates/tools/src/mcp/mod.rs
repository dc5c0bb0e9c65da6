//! Remote tools from MCP servers.

pub mod client;

pub use client::McpClient;

use codehelper_config::McpServerConfig;
use codehelper_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Connect to every configured server and register its tools.
///
/// A server that cannot be reached is logged and skipped; the rest of the
/// registry stays usable. Returns the number of tools added.
pub async fn discover_all(registry: &mut ToolRegistry, servers: &[McpServerConfig]) -> usize {
    let mut added = 0;
    for server in servers {
        let client = match McpClient::new(
            &server.name,
            &server.url,
            Duration::from_secs(server.timeout_secs),
        ) {
            Ok(client) => client,
            Err(e) => {
                warn!(server = %server.name, error = %e, "Skipping MCP server");
                continue;
            }
        };
        match registry.discover(Arc::new(client)).await {
            Ok(n) => added += n,
            Err(e) => warn!(server = %server.name, url = %server.url, error = %e, "MCP discovery failed"),
        }
    }
    added
}
