//! Request dispatcher: validate, enrich, generate.

use std::sync::Arc;

use profesor_config::AppConfig;
use profesor_core::error::{Error, ValidationError};
use profesor_core::provider::{Provider, ProviderRequest};
use profesor_knowledge::{AggregatedContext, ContextAggregator, KnowledgeHub};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::ModelCatalog;
use crate::multiplexer::{EventStream, StreamMultiplexer};
use crate::prompt::build_messages;
use crate::stream_event::StreamEvent;

/// Inbound chat request as sent by clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Missing reads as empty and fails validation.
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub use_streaming: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// A request that passed validation, with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedChat {
    pub message: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUsed {
    pub tool: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_used: Option<ToolUsed>,
    pub has_context: bool,
}

/// Dispatcher knobs taken from configuration.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub persona: String,
    pub max_message_chars: usize,
    pub default_temperature: f32,
    pub default_top_p: f32,
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            persona: config.persona.clone(),
            max_message_chars: config.max_message_chars,
            default_temperature: config.default_temperature,
            default_top_p: config.default_top_p,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Entry point for one chat turn, shared by the gateway and the CLI.
pub struct ChatDispatcher {
    provider: Arc<dyn Provider>,
    aggregator: Arc<ContextAggregator>,
    models: ModelCatalog,
    settings: DispatchSettings,
    multiplexer: StreamMultiplexer,
}

impl ChatDispatcher {
    pub fn new(
        provider: Arc<dyn Provider>,
        aggregator: Arc<ContextAggregator>,
        models: ModelCatalog,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            provider,
            aggregator,
            models,
            settings,
            multiplexer: StreamMultiplexer::default(),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        hub: Arc<KnowledgeHub>,
    ) -> Self {
        Self::new(
            provider,
            Arc::new(ContextAggregator::from_config(hub, &config.knowledge)),
            ModelCatalog::from_config(config),
            DispatchSettings::from_config(config),
        )
    }

    pub fn with_multiplexer(mut self, multiplexer: StreamMultiplexer) -> Self {
        self.multiplexer = multiplexer;
        self
    }

    pub fn hub(&self) -> &Arc<KnowledgeHub> {
        self.aggregator.hub()
    }

    pub fn aggregator(&self) -> &Arc<ContextAggregator> {
        &self.aggregator
    }

    pub fn models(&self) -> &ModelCatalog {
        &self.models
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn validate(&self, request: &ChatRequest) -> Result<ValidatedChat, ValidationError> {
        if request.message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        let length = request.message.chars().count();
        if length > self.settings.max_message_chars {
            return Err(ValidationError::MessageTooLong {
                length,
                max: self.settings.max_message_chars,
            });
        }

        let model = self.models.resolve(request.model.as_deref())?;

        let temperature = request
            .temperature
            .unwrap_or(self.settings.default_temperature);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ValidationError::InvalidParameter {
                name: "temperature",
                reason: format!("{temperature} is outside 0.0..=2.0"),
            });
        }

        let top_p = request.top_p.unwrap_or(self.settings.default_top_p);
        if !(0.0..=1.0).contains(&top_p) {
            return Err(ValidationError::InvalidParameter {
                name: "topP",
                reason: format!("{top_p} is outside 0.0..=1.0"),
            });
        }

        Ok(ValidatedChat {
            message: request.message.clone(),
            model: model.id.clone(),
            temperature,
            top_p,
            system_prompt: request.system_prompt.clone(),
        })
    }

    /// Generate a complete answer.
    pub async fn respond(&self, request: &ChatRequest) -> Result<ChatResponse, Error> {
        let chat = self.validate(request)?;
        let context = self.aggregator.gather(&chat.message).await;
        let provider_request = self.provider_request(&chat, &context, false);

        info!(model = %chat.model, has_context = context.has_context(), "Generating response");
        let response = self.provider.complete(provider_request).await?;

        Ok(ChatResponse {
            response: response.message.content,
            model: chat.model,
            tool_used: tool_used(&context),
            has_context: context.has_context(),
        })
    }

    /// Start a streamed answer.
    ///
    /// Validation and context lookup finish before this returns; generation
    /// failures arrive as the stream's terminal event.
    pub async fn respond_stream(&self, request: &ChatRequest) -> Result<EventStream, ValidationError> {
        let chat = self.validate(request)?;
        let context = self.aggregator.gather(&chat.message).await;
        let provider_request = self.provider_request(&chat, &context, true);

        let preface = tool_used(&context)
            .map(|used| StreamEvent::ToolUsed {
                tool: used.tool,
                reasoning: used.reasoning,
            })
            .into_iter()
            .collect();

        info!(model = %chat.model, has_context = context.has_context(), "Streaming response");
        let provider = self.provider.clone();
        Ok(self
            .multiplexer
            .spawn(preface, async move { provider.stream(provider_request).await }))
    }

    fn provider_request(
        &self,
        chat: &ValidatedChat,
        context: &AggregatedContext,
        stream: bool,
    ) -> ProviderRequest {
        debug!(outcome = ?context.outcome, context_chars = context.text.len(), "Assembling prompt");
        ProviderRequest {
            model: chat.model.clone(),
            messages: build_messages(
                &self.settings.persona,
                chat.system_prompt.as_deref(),
                &context.text,
                &chat.message,
            ),
            temperature: chat.temperature,
            top_p: Some(chat.top_p),
            max_tokens: None,
            stream,
        }
    }
}

fn tool_used(context: &AggregatedContext) -> Option<ToolUsed> {
    let decision = context.decision.as_ref()?;
    Some(ToolUsed {
        tool: decision.tool_id.clone()?,
        reasoning: decision.reasoning.clone(),
    })
}
