//! JSON-RPC 2.0 client for MCP servers reachable over HTTP.
//!
//! The handshake (`initialize` then `notifications/initialized`) runs lazily
//! before the first real request. Servers may answer either with a plain
//! JSON body or with a single-event `text/event-stream`; both are accepted.

use async_trait::async_trait;
use codehelper_core::error::ToolError;
use codehelper_core::tool::{RemoteToolSpec, RemoteToolTransport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<McpTool>,
}

#[derive(Debug, Deserialize)]
struct McpTool {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    input_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CallToolResult {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(rename = "isError", default)]
    is_error: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// An MCP server speaking JSON-RPC over HTTP POST.
pub struct McpClient {
    server: String,
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
    session_id: Mutex<Option<String>>,
    initialized: OnceCell<()>,
}

impl McpClient {
    pub fn new(
        server: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ToolError> {
        let server = server.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::Transport {
                server: server.clone(),
                reason: format!("HTTP client: {e}"),
            })?;
        Ok(Self {
            server,
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
            session_id: Mutex::new(None),
            initialized: OnceCell::new(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn transport_error(&self, reason: impl std::fmt::Display) -> ToolError {
        ToolError::Transport {
            server: self.server.clone(),
            reason: reason.to_string(),
        }
    }

    async fn ensure_initialized(&self) -> Result<(), ToolError> {
        self.initialized
            .get_or_try_init(|| async {
                let result = self
                    .send(
                        "initialize",
                        serde_json::json!({
                            "protocolVersion": PROTOCOL_VERSION,
                            "capabilities": {},
                            "clientInfo": {
                                "name": "codehelper",
                                "version": env!("CARGO_PKG_VERSION")
                            }
                        }),
                    )
                    .await?;
                let server_name = result
                    .pointer("/serverInfo/name")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                info!(server = %self.server, remote = server_name, "MCP session initialized");
                self.notify("notifications/initialized").await
            })
            .await
            .map(|_| ())
    }

    async fn post(&self, body: &JsonRpcRequest<'_>) -> Result<reqwest::Response, ToolError> {
        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
            .json(body);
        if let Some(session) = self.session_id.lock().await.as_deref() {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.lock().await = Some(session.to_string());
        }

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.transport_error(format!("HTTP {status}: {text}")));
        }
        Ok(response)
    }

    async fn notify(&self, method: &str) -> Result<(), ToolError> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: None,
            method,
            params: serde_json::json!({}),
        };
        self.post(&body).await.map(|_| ())
    }

    /// Send a request and return its `result`.
    async fn send(&self, method: &str, params: Value) -> Result<Value, ToolError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(server = %self.server, method, id, "MCP request");
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        };

        let response = self.post(&body).await?;
        let is_sse = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        let parsed = parse_response(&text, is_sse).map_err(|e| self.transport_error(e))?;
        match (parsed.result, parsed.error) {
            (_, Some(error)) => Err(ToolError::ExecutionFailed {
                tool_name: format!("{}/{method}", self.server),
                reason: format!("JSON-RPC error {}: {}", error.code, error.message),
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

#[async_trait]
impl RemoteToolTransport for McpClient {
    fn server_name(&self) -> &str {
        &self.server
    }

    async fn list_tools(&self) -> Result<Vec<RemoteToolSpec>, ToolError> {
        self.ensure_initialized().await?;
        let result = self.send("tools/list", serde_json::json!({})).await?;
        let listed: ListToolsResult = serde_json::from_value(result)
            .map_err(|e| self.transport_error(format!("malformed tools/list result: {e}")))?;

        Ok(listed
            .tools
            .into_iter()
            .map(|t| RemoteToolSpec {
                name: t.name,
                description: t.description.unwrap_or_default(),
                input_schema: t
                    .input_schema
                    .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
            })
            .collect())
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        self.ensure_initialized().await?;
        let result = self
            .send(
                "tools/call",
                serde_json::json!({ "name": name, "arguments": arguments }),
            )
            .await
            .map_err(|e| match e {
                ToolError::ExecutionFailed { reason, .. } => ToolError::ExecutionFailed {
                    tool_name: name.to_string(),
                    reason,
                },
                other => other,
            })?;

        let call: CallToolResult = serde_json::from_value(result)
            .map_err(|e| self.transport_error(format!("malformed tools/call result: {e}")))?;
        let text = join_text(&call.content);

        if call.is_error {
            let reason = if text.is_empty() {
                "MCP tool returned error".to_string()
            } else {
                text
            };
            return Err(ToolError::ExecutionFailed {
                tool_name: name.to_string(),
                reason,
            });
        }

        Ok(if text.is_empty() {
            "(no output)".to_string()
        } else {
            text
        })
    }
}

fn parse_response(body: &str, is_sse: bool) -> Result<JsonRpcResponse, String> {
    let payload = if is_sse {
        body.lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim)
            .find(|data| !data.is_empty())
            .ok_or_else(|| "event stream carried no data".to_string())?
    } else {
        body
    };
    serde_json::from_str(payload).map_err(|e| format!("invalid JSON-RPC response: {e}"))
}

fn join_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
