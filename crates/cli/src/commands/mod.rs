pub mod chat;
pub mod gateway;
pub mod ingest;
pub mod tools;

use codehelper_config::AppConfig;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}

/// Print setup help when the provider needs a key and none is configured.
pub fn require_api_key(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.has_api_key() || config.provider == "custom" {
        return Ok(());
    }
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    CODEHELPER_API_KEY   (generic)");
    eprintln!("    GITHUB_TOKEN         (GitHub Models, the default provider)");
    eprintln!("    OPENAI_API_KEY       (OpenAI direct)");
    eprintln!();
    eprintln!("  Or add `api_key` to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}
