//! Model catalog built from configuration.

use profesor_config::{AppConfig, ModelConfig, ModelKind};
use profesor_core::error::ValidationError;
use serde::{Deserialize, Serialize};

/// A chat model as offered to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_default: bool,
}

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelConfig>,
    default_id: String,
}

impl ModelCatalog {
    pub fn new(models: Vec<ModelConfig>, default_id: impl Into<String>) -> Self {
        Self {
            models,
            default_id: default_id.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.models.clone(), config.default_model.clone())
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// Resolve the requested model, or the default when none is given.
    ///
    /// Only text models can serve chat.
    pub fn resolve(&self, requested: Option<&str>) -> Result<&ModelConfig, ValidationError> {
        let id = requested
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.default_id);

        let model = self
            .models
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| ValidationError::UnknownModel(id.to_string()))?;

        match model.kind {
            ModelKind::Text => Ok(model),
            ModelKind::Image => Err(ValidationError::UnsupportedModel(id.to_string())),
        }
    }

    pub fn text_models(&self) -> Vec<ModelDescriptor> {
        self.models
            .iter()
            .filter(|m| m.kind == ModelKind::Text)
            .map(|m| ModelDescriptor {
                id: m.id.clone(),
                name: m.name.clone(),
                description: m.description.clone(),
                is_default: m.id == self.default_id,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ModelCatalog {
        ModelCatalog::from_config(&AppConfig::default())
    }

    #[test]
    fn resolves_default_when_absent() {
        let catalog = catalog();
        assert_eq!(catalog.resolve(None).unwrap().id, "gemini-2.5-flash-lite");
        assert_eq!(catalog.resolve(Some("  ")).unwrap().id, "gemini-2.5-flash-lite");
    }

    #[test]
    fn resolves_explicit_model() {
        assert_eq!(catalog().resolve(Some("gemini-2.5-pro")).unwrap().id, "gemini-2.5-pro");
    }

    #[test]
    fn unknown_model_rejected() {
        assert_eq!(
            catalog().resolve(Some("gpt-17")).unwrap_err(),
            ValidationError::UnknownModel("gpt-17".into())
        );
    }

    #[test]
    fn image_model_rejected_for_chat() {
        assert!(matches!(
            catalog().resolve(Some("gemini-2.5-flash-image")),
            Err(ValidationError::UnsupportedModel(_))
        ));
    }

    #[test]
    fn text_models_mark_default() {
        let models = catalog().text_models();
        assert_eq!(models.len(), 3);
        assert_eq!(models.iter().filter(|m| m.is_default).count(), 1);
        let json = serde_json::to_value(&models[0]).unwrap();
        assert_eq!(json["isDefault"], true);
    }
}
