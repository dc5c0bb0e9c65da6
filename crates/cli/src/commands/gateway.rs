//! `codehelper gateway`: start the HTTP API server.

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;
    super::require_api_key(&config)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("codehelper gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Chat SSE:  GET /api/ai/chat?memoryId=<id>&message=<text>");

    codehelper_gateway::start(config).await?;

    Ok(())
}
