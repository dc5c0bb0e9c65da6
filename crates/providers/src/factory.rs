//! Provider construction from configuration.

use std::sync::Arc;
use std::time::Duration;
use codehelper_config::AppConfig;
use codehelper_core::error::ProviderError;
use codehelper_core::provider::Provider;
use crate::openai_compat::OpenAiCompatProvider;

/// Base URL of the GitHub Models inference endpoint.
pub const GITHUB_MODELS_URL: &str = "https://models.inference.ai.azure.com";

/// Build the configured chat/embedding provider.
///
/// Hosted providers need an API key; local endpoints (ollama, custom
/// base URLs) accept an empty one.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| default_base_url(&config.provider));

    let api_key = match (&config.api_key, requires_api_key(&config.provider)) {
        (Some(key), _) => key.clone(),
        (None, false) => String::new(),
        (None, true) => {
            return Err(ProviderError::NotConfigured(format!(
                "provider '{}' needs an API key (set CODEHELPER_API_KEY or GITHUB_TOKEN)",
                config.provider
            )));
        }
    };

    let provider = OpenAiCompatProvider::new(
        &config.provider,
        base_url,
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    Ok(Arc::new(provider))
}

fn requires_api_key(provider_name: &str) -> bool {
    matches!(provider_name, "github" | "openai")
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "github" => GITHUB_MODELS_URL.into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        _ => "http://localhost:8000/v1".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("github").contains("models.inference.ai.azure.com"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn github_without_token_is_not_configured() {
        let config = AppConfig::default();
        let err = build_from_config(&config).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(err.to_string().contains("GITHUB_TOKEN"));
    }

    #[test]
    fn build_with_token() {
        let config = AppConfig {
            api_key: Some("ghp_test".into()),
            ..AppConfig::default()
        };
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "github");
    }

    #[test]
    fn local_provider_needs_no_key() {
        let config = AppConfig {
            provider: "ollama".into(),
            ..AppConfig::default()
        };
        assert!(build_from_config(&config).is_ok());
    }
}
