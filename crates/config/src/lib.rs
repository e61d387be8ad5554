//! Configuration loading, validation, and management for Profesor.
//!
//! Loads configuration from `~/.profesor/config.toml` (or the file named by
//! `PROFESOR_CONFIG`) with environment variable overrides. Validates all
//! settings at startup.

use profesor_core::knowledge::{KnowledgeServerDescriptor, TransportKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.profesor/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default generation provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used when a request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    #[serde(default = "default_top_p")]
    pub default_top_p: f32,

    /// Upper bound on the characters of one user message
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Assistant persona placed at the top of every prompt
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Models offered to callers
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Knowledge server configuration
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.5-flash-lite".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.9
}
fn default_max_message_chars() -> usize {
    10_000
}
fn default_persona() -> String {
    "You are El Profesor, a knowledgeable AI assistant.".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
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
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_top_p", &self.default_top_p)
            .field("max_message_chars", &self.max_message_chars)
            .field("persona", &self.persona)
            .field("models", &self.models)
            .field("gateway", &self.gateway)
            .field("providers", &self.providers)
            .field("knowledge", &self.knowledge)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// What a model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Text,
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_model_kind")]
    pub kind: ModelKind,
}

fn default_model_kind() -> ModelKind {
    ModelKind::Text
}

impl ModelConfig {
    fn new(id: &str, name: &str, description: &str, kind: ModelKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            kind,
        }
    }
}

fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig::new(
            "gemini-2.5-flash-lite",
            "Gemini 2.5 Flash Lite",
            "Fastest and most efficient for simple tasks",
            ModelKind::Text,
        ),
        ModelConfig::new(
            "gemini-2.5-flash",
            "Gemini 2.5 Flash",
            "Fast and efficient for most tasks",
            ModelKind::Text,
        ),
        ModelConfig::new(
            "gemini-2.5-pro",
            "Gemini 2.5 Pro",
            "Most capable for complex reasoning and analysis",
            ModelKind::Text,
        ),
        ModelConfig::new(
            "gemini-2.5-flash-preview-image",
            "Gemini 2.5 Flash Image Preview",
            "Image generation preview",
            ModelKind::Image,
        ),
        ModelConfig::new(
            "gemini-2.5-flash-image",
            "Gemini 2.5 Flash Image",
            "Image generation",
            ModelKind::Image,
        ),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// CORS origins; empty allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    3001
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            body_limit_bytes: default_body_limit(),
            allowed_origins: vec![],
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path suffixes tried, in order, when looking for a working endpoint
    #[serde(default = "default_probe_paths")]
    pub probe_paths: Vec<String>,

    /// A query must mention one of these before any lookup happens
    #[serde(default = "default_relevance_keywords")]
    pub relevance_keywords: Vec<String>,

    /// Upper bound for one whole context lookup
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,

    #[serde(default = "default_servers")]
    pub servers: Vec<KnowledgeServerConfig>,
}

fn default_probe_paths() -> Vec<String> {
    ["", "/mcp", "/api/mcp", "/jsonrpc"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_relevance_keywords() -> Vec<String> {
    [
        "aws",
        "amazon",
        "ec2",
        "s3",
        "lambda",
        "cloudformation",
        "terraform",
        "cloud",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_lookup_timeout() -> u64 {
    45
}

fn default_servers() -> Vec<KnowledgeServerConfig> {
    let mut headers = BTreeMap::new();
    headers.insert("User-Agent".into(), "El-Profesor-AI-Assistant/1.0".into());
    vec![KnowledgeServerConfig {
        name: "aws-knowledge".into(),
        transport: TransportKind::Http,
        url: "https://knowledge-mcp.global.api.aws".into(),
        headers,
        timeout_secs: default_server_timeout(),
    }]
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            probe_paths: default_probe_paths(),
            relevance_keywords: default_relevance_keywords(),
            lookup_timeout_secs: default_lookup_timeout(),
            servers: default_servers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeServerConfig {
    pub name: String,

    #[serde(default = "default_transport")]
    pub transport: TransportKind,

    pub url: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default = "default_server_timeout")]
    pub timeout_secs: u64,
}

fn default_transport() -> TransportKind {
    TransportKind::Http
}
fn default_server_timeout() -> u64 {
    30
}

impl KnowledgeServerConfig {
    /// The immutable descriptor the knowledge client is built from.
    pub fn descriptor(&self) -> KnowledgeServerDescriptor {
        KnowledgeServerDescriptor {
            name: self.name.clone(),
            transport: self.transport,
            base_url: self.url.trim_end_matches('/').to_string(),
            headers: self.headers.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.profesor/config.toml),
    /// or from `PROFESOR_CONFIG` when set.
    ///
    /// Also checks environment variables for API keys:
    /// - `PROFESOR_API_KEY` (highest priority)
    /// - `GOOGLE_API_KEY`
    /// - `GEMINI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("PROFESOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("PROFESOR_API_KEY")
                .or_else(|| lookup("GOOGLE_API_KEY"))
                .or_else(|| lookup("GEMINI_API_KEY"));
        }

        if let Some(provider) = lookup("PROFESOR_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("PROFESOR_MODEL") {
            self.default_model = model;
        }
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
        dirs_home().join(".profesor")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.default_top_p) {
            return Err(ConfigError::ValidationError(
                "default_top_p must be between 0.0 and 1.0".into(),
            ));
        }

        if self.max_message_chars == 0 {
            return Err(ConfigError::ValidationError(
                "max_message_chars must be > 0".into(),
            ));
        }

        let default_is_text = self
            .models
            .iter()
            .any(|m| m.id == self.default_model && m.kind == ModelKind::Text);
        if !default_is_text {
            return Err(ConfigError::ValidationError(format!(
                "default_model '{}' must be one of the configured text models",
                self.default_model
            )));
        }

        let lookup = self.knowledge.lookup_timeout_secs;
        if lookup == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.lookup_timeout_secs must be > 0".into(),
            ));
        }

        for server in &self.knowledge.servers {
            if server.timeout_secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "knowledge server '{}' needs a timeout > 0",
                    server.name
                )));
            }
            if server.timeout_secs > lookup {
                return Err(ConfigError::ValidationError(format!(
                    "knowledge server '{}' timeout ({}s) exceeds lookup_timeout_secs ({lookup}s)",
                    server.name, server.timeout_secs
                )));
            }
            let probe_budget = server.timeout_secs * self.knowledge.probe_paths.len() as u64;
            if probe_budget > lookup {
                tracing::warn!(
                    server = %server.name,
                    probe_budget_secs = probe_budget,
                    lookup_timeout_secs = lookup,
                    "Probing may outlast a lookup; early questions can be answered without context"
                );
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_top_p: default_top_p(),
            max_message_chars: default_max_message_chars(),
            persona: default_persona(),
            models: default_models(),
            gateway: GatewayConfig::default(),
            providers: HashMap::new(),
            knowledge: KnowledgeConfig::default(),
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
