//! `profesor status`: Show configuration and knowledge server status.

use std::sync::Arc;

use profesor_config::AppConfig;
use profesor_core::Provider;
use profesor_knowledge::KnowledgeHub;
use profesor_providers::router::build_from_config;

use super::load_config;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    println!("El Profesor Status");
    println!("==================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Provider:     {}", config.default_provider);
    println!("  Model:        {}", config.default_model);
    println!("  Temperature:  {}", config.default_temperature);
    println!("  Top-p:        {}", config.default_top_p);
    println!("  API key:      {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "  Knowledge:    {}",
        if config.knowledge.enabled { "enabled" } else { "disabled" }
    );

    println!(
        "  Provider API: {}",
        provider_health(build_from_config(&config).default()).await
    );

    // Check config file existence
    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file, run `profesor onboard` first");
    }

    if config.knowledge.servers.is_empty() {
        println!("\n  No knowledge servers configured");
        return Ok(());
    }

    let hub = KnowledgeHub::from_config(&config.knowledge);
    let catalog = hub.initialize().await;
    let report = hub.test_connection().await;

    println!("\n  Knowledge servers");
    for server in catalog.server_summaries() {
        println!(
            "    {} [{}] {}: {} tools",
            server.name, server.transport, server.url, server.tool_count
        );
    }
    println!(
        "  Connection:   {} ({})",
        if report.success { "ok" } else { "failed" },
        report.details
    );

    hub.cleanup();
    Ok(())
}

async fn provider_health(provider: Option<Arc<dyn Provider>>) -> String {
    let Some(provider) = provider else {
        return "not configured".into();
    };
    match provider.health_check().await {
        Ok(true) => "reachable".into(),
        Ok(false) => "rejected the request (check the API key)".into(),
        Err(e) => format!("unreachable ({e})"),
    }
}
