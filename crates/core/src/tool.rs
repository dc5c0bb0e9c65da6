//! Tool trait and registry: the capabilities the model may request.
//!
//! A tool is either a local function executed in-process or a remote tool
//! reached through a [`RemoteToolTransport`] (an MCP server). Both share one
//! invocation contract through [`ToolRegistry::execute`]. The registry is
//! built at startup and only read afterwards.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A locally executed tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "interviewQuestionSearch").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A tool as advertised by a remote server's listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub input_schema: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// Discovery and invocation handle for a remote tool server.
#[async_trait]
pub trait RemoteToolTransport: Send + Sync {
    /// Name of the server, used to namespace its tools.
    fn server_name(&self) -> &str;

    /// List the tools the server offers.
    async fn list_tools(&self) -> std::result::Result<Vec<RemoteToolSpec>, ToolError>;

    /// Invoke a tool by its server-side name and return its text output.
    async fn invoke(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<String, ToolError>;
}

/// How a registered tool is executed.
pub enum ToolCapability {
    Local(Box<dyn Tool>),
    Remote {
        remote_name: String,
        transport: Arc<dyn RemoteToolTransport>,
    },
}

impl std::fmt::Debug for ToolCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(tool) => f.debug_tuple("Local").field(&tool.name()).finish(),
            Self::Remote { remote_name, transport } => f
                .debug_struct("Remote")
                .field("server", &transport.server_name())
                .field("remote_name", remote_name)
                .finish(),
        }
    }
}

/// A registered tool: what the model sees plus how to run it.
#[derive(Debug)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    pub capability: ToolCapability,
}

impl ToolDescriptor {
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.capability, ToolCapability::Remote { .. })
    }
}

/// A registry of available tools, keyed by unique name.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Names must be unique within the registry.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> std::result::Result<(), ToolError> {
        if self.tools.contains_key(&descriptor.name) {
            return Err(ToolError::DuplicateName(descriptor.name));
        }
        debug!(tool = %descriptor.name, remote = descriptor.is_remote(), "Registered tool");
        self.tools.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Register a local tool.
    pub fn register_local(&mut self, tool: Box<dyn Tool>) -> std::result::Result<(), ToolError> {
        self.register(ToolDescriptor {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
            capability: ToolCapability::Local(tool),
        })
    }

    /// Discover a remote server's tools and register them as `{server}_{tool}`.
    ///
    /// Returns the number of tools registered. Individual name clashes are
    /// skipped; a listing failure is returned to the caller.
    pub async fn discover(
        &mut self,
        transport: Arc<dyn RemoteToolTransport>,
    ) -> std::result::Result<usize, ToolError> {
        let specs = transport.list_tools().await?;
        let server = transport.server_name().to_string();
        let mut added = 0;
        for spec in specs {
            let descriptor = ToolDescriptor {
                name: format!("{server}_{}", spec.name),
                description: spec.description,
                parameters: spec.input_schema,
                capability: ToolCapability::Remote {
                    remote_name: spec.name,
                    transport: Arc::clone(&transport),
                },
            };
            match self.register(descriptor) {
                Ok(()) => added += 1,
                Err(e) => tracing::warn!(server = %server, error = %e, "Skipping remote tool"),
            }
        }
        info!(server = %server, tools = added, "Discovered remote tools");
        Ok(added)
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Get all tool definitions (for sending to the model), ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool call against a local or remote tool.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let descriptor = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        match &descriptor.capability {
            ToolCapability::Local(tool) => {
                let mut result = tool.execute(call.arguments.clone()).await?;
                result.call_id = call.id.clone();
                Ok(result)
            }
            ToolCapability::Remote { remote_name, transport } => {
                let output = transport.invoke(remote_name, call.arguments.clone()).await?;
                Ok(ToolResult {
                    call_id: call.id.clone(),
                    success: true,
                    output,
                    data: None,
                })
            }
        }
    }

    /// List all registered tool names, ordered.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
