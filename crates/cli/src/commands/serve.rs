//! `profesor serve`: Start the HTTP API server.

use super::load_config;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("El Profesor Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.default_model);
    println!(
        "   Knowledge: {}",
        if config.knowledge.enabled { "enabled" } else { "disabled" }
    );

    profesor_gateway::start(config).await?;

    Ok(())
}
