//! `codehelper tools`: list the registry after MCP discovery.

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let registry = codehelper_tools::build_registry(&config).await;

    if registry.is_empty() {
        println!("No tools registered.");
        return Ok(());
    }

    println!("{} tool(s):", registry.len());
    for def in registry.definitions() {
        println!("  {:<32} {}", def.name, def.description);
    }
    Ok(())
}
