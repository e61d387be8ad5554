//! `profesor models`: List chat models.

use profesor_agent::ModelCatalog;

use super::load_config;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let catalog = ModelCatalog::from_config(&config);

    println!("Available models");
    println!("================");
    for model in catalog.text_models() {
        let marker = if model.is_default { " (default)" } else { "" };
        println!("  {}{marker}", model.id);
        println!("      {}: {}", model.name, model.description);
    }

    Ok(())
}
