//! Configuration loading and validation for codehelper.
//!
//! Loads configuration from `~/.codehelper/config.toml` with environment
//! variable overrides. Validates all settings at startup; the result is a
//! static configuration object shared by every component.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prompt used when neither `system_prompt` nor `system_prompt_file` is set.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a programming learning assistant. \
Help the user plan how to learn programming, answer interview questions, \
explain concepts clearly and suggest concrete next steps. \
When reference material is provided, prefer it over general knowledge.";

/// The root configuration structure.
///
/// Maps directly to `~/.codehelper/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider kind: "github", "openai", or "custom"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Chat model
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding model used by the retrieval pipeline
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Timeout for a single model request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Inline system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// System prompt loaded from a file (used when `system_prompt` is unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_file: Option<PathBuf>,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub guardrail: GuardrailConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub mcp: McpConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_provider() -> String {
    "github".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("system_prompt", &self.system_prompt)
            .field("system_prompt_file", &self.system_prompt_file)
            .field("memory", &self.memory)
            .field("retrieval", &self.retrieval)
            .field("guardrail", &self.guardrail)
            .field("tools", &self.tools)
            .field("mcp", &self.mcp)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// Session memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum messages retained per session (FIFO)
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_window() -> usize {
    3
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { window: default_window() }
    }
}

/// Retrieval pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory of documents ingested at startup
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,

    /// Top-k
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Minimum relevance score in [0, 1]
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Maximum chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// "provider" (remote embedding endpoint) or "hashing" (offline)
    #[serde(default = "default_embedding")]
    pub embedding: String,

    /// Vector width of the hashing embedder
    #[serde(default = "default_hashing_dimensions")]
    pub hashing_dimensions: usize,
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("docs")
}
fn default_max_results() -> usize {
    2
}
fn default_min_score() -> f32 {
    0.75
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_embedding() -> String {
    "provider".into()
}
fn default_hashing_dimensions() -> usize {
    512
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            docs_dir: default_docs_dir(),
            max_results: default_max_results(),
            min_score: default_min_score(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embedding: default_embedding(),
            hashing_dimensions: default_hashing_dimensions(),
        }
    }
}

/// Input guardrail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Words that veto a turn when they appear as whole tokens
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
}

fn default_denylist() -> Vec<String> {
    vec!["kill".into(), "evil".into()]
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self { denylist: default_denylist() }
    }
}

/// Tool loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Maximum model calls per turn while tools are being requested
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Timeout for a single tool invocation
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,

    /// Register the interview question search tool
    #[serde(default = "default_true")]
    pub interview_search: bool,
}

fn default_max_rounds() -> usize {
    5
}
fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            timeout_secs: default_tool_timeout_secs(),
            interview_search: true,
        }
    }
}

/// Remote (MCP) tool servers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Prefix for the server's tool names
    pub name: String,

    /// JSON-RPC endpoint
    pub url: String,

    #[serde(default = "default_mcp_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_mcp_timeout_secs() -> u64 {
    20
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origins allowed by CORS; empty allows any origin
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8081
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.codehelper/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `CODEHELPER_API_KEY` (highest priority)
    /// - `GITHUB_TOKEN`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("CODEHELPER_API_KEY")
                .ok()
                .or_else(|| std::env::var("GITHUB_TOKEN").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("CODEHELPER_MODEL") {
            config.model = model;
        }

        if let Ok(base_url) = std::env::var("CODEHELPER_BASE_URL") {
            config.base_url = Some(base_url);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".codehelper")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.memory.window == 0 {
            return Err(ConfigError::ValidationError(
                "memory.window must be at least 1".into(),
            ));
        }

        let retrieval = &self.retrieval;
        if !(0.0..=1.0).contains(&retrieval.min_score) {
            return Err(ConfigError::ValidationError(
                "retrieval.min_score must be between 0.0 and 1.0".into(),
            ));
        }
        if retrieval.chunk_size == 0 || retrieval.chunk_overlap >= retrieval.chunk_size {
            return Err(ConfigError::ValidationError(
                "retrieval.chunk_overlap must be smaller than a non-zero retrieval.chunk_size".into(),
            ));
        }
        if !matches!(retrieval.embedding.as_str(), "provider" | "hashing") {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.embedding must be \"provider\" or \"hashing\", got \"{}\"",
                retrieval.embedding
            )));
        }

        if self.tools.max_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "tools.max_rounds must be at least 1".into(),
            ));
        }

        for server in &self.mcp.servers {
            if server.name.is_empty() || server.url.is_empty() {
                return Err(ConfigError::ValidationError(
                    "mcp servers need both a name and a url".into(),
                ));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Resolve the system prompt: inline text, then file, then the built-in default.
    pub fn resolve_system_prompt(&self) -> Result<String, ConfigError> {
        if let Some(prompt) = &self.system_prompt {
            return Ok(prompt.clone());
        }
        match &self.system_prompt_file {
            Some(path) => std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.clone(),
                reason: e.to_string(),
            }),
            None => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            base_url: None,
            model: default_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
            system_prompt: None,
            system_prompt_file: None,
            memory: MemoryConfig::default(),
            retrieval: RetrievalConfig::default(),
            guardrail: GuardrailConfig::default(),
            tools: ToolsConfig::default(),
            mcp: McpConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider, "github");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.memory.window, 3);
        assert_eq!(config.retrieval.max_results, 2);
        assert!((config.retrieval.min_score - 0.75).abs() < f32::EPSILON);
        assert_eq!(config.retrieval.chunk_size, 1000);
        assert_eq!(config.retrieval.chunk_overlap, 200);
        assert_eq!(config.guardrail.denylist, vec!["kill", "evil"]);
        assert_eq!(config.tools.max_rounds, 5);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let mut config = AppConfig::default();
        config.retrieval.chunk_overlap = 1000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn zero_window_rejected() {
        let mut config = AppConfig::default();
        config.memory.window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_embedding_kind_rejected() {
        let mut config = AppConfig::default();
        config.retrieval.embedding = "magic".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider, "github");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model = "gpt-4o-mini"

[memory]
window = 10

[guardrail]
denylist = ["hack"]

[[mcp.servers]]
name = "docs"
url = "http://localhost:3000/mcp"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.memory.window, 10);
        assert_eq!(config.guardrail.denylist, vec!["hack"]);
        assert_eq!(config.mcp.servers.len(), 1);
        assert_eq!(config.mcp.servers[0].timeout_secs, 20);
        assert_eq!(config.retrieval.chunk_size, 1000);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = [").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("ghp_secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn system_prompt_resolution_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "from file").unwrap();

        let mut config = AppConfig::default();
        assert_eq!(config.resolve_system_prompt().unwrap(), DEFAULT_SYSTEM_PROMPT);

        config.system_prompt_file = Some(path);
        assert_eq!(config.resolve_system_prompt().unwrap(), "from file");

        config.system_prompt = Some("inline".into());
        assert_eq!(config.resolve_system_prompt().unwrap(), "inline");
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o"));
        assert!(toml_str.contains("8081"));
    }
}
