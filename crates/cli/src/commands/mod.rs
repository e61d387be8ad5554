pub mod chat;
pub mod models;
pub mod onboard;
pub mod serve;
pub mod status;

use std::sync::Arc;

use profesor_agent::ChatDispatcher;
use profesor_config::AppConfig;
use profesor_knowledge::KnowledgeHub;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Wire provider, knowledge hub and dispatcher from configuration.
pub fn build_dispatcher(
    config: &AppConfig,
) -> Result<(ChatDispatcher, Arc<KnowledgeHub>), Box<dyn std::error::Error>> {
    let router = profesor_providers::router::build_from_config(config);
    let provider = router.default().ok_or("No default provider configured")?;
    let hub = Arc::new(KnowledgeHub::from_config(&config.knowledge));
    let dispatcher = ChatDispatcher::from_config(config, provider, hub.clone());
    Ok((dispatcher, hub))
}
