//! HTTP API handlers.
//!
//! Endpoints:
//!
//! - `POST /chat`: Direct JSON answer, or SSE when `useStreaming`
//! - `POST /chat/message`: Legacy SSE stream (`{content}` / `[DONE]`)
//! - `GET  /models`: Chat models and the default
//! - `GET  /status`: Knowledge servers, tools and current model
//! - `GET  /knowledge/test`: Knowledge server connection check
//! - `POST /knowledge/context`: Context lookup for a query

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use profesor_agent::{ChatRequest, ModelDescriptor};
use profesor_core::knowledge::{ServerSummary, ToolDescriptor, TransportKind};
use profesor_knowledge::ConnectionReport;

use crate::SharedState;
use crate::error::ApiError;
use crate::frames::{chat_frame, legacy_frame, sse};

pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/message", post(legacy_message_handler))
        .route("/models", get(models_handler))
        .route("/status", get(status_handler))
        .route("/knowledge/test", get(knowledge_test_handler))
        .route("/knowledge/context", post(knowledge_context_handler))
        .with_state(state)
}

// ── Chat ──────────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    info!(
        streaming = request.use_streaming,
        model = request.model.as_deref().unwrap_or("default"),
        "Chat request"
    );

    if request.use_streaming {
        let events = state.dispatcher.respond_stream(&request).await?;
        Ok(sse(events, chat_frame).into_response())
    } else {
        let response = state.dispatcher.respond(&request).await?;
        Ok(Json(response).into_response())
    }
}

#[derive(Debug, Deserialize)]
struct LegacyMessageRequest {
    #[serde(default)]
    message: String,
}

async fn legacy_message_handler(
    State(state): State<SharedState>,
    Json(payload): Json<LegacyMessageRequest>,
) -> Result<Response, ApiError> {
    let mut request = ChatRequest::new(payload.message);
    request.use_streaming = true;
    let events = state.dispatcher.respond_stream(&request).await?;
    Ok(sse(events, legacy_frame).into_response())
}

// ── Models & status ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ModelsResponse {
    models: Vec<ModelDescriptor>,
    default: String,
}

async fn models_handler(State(state): State<SharedState>) -> Json<ModelsResponse> {
    let models = state.dispatcher.models();
    Json(ModelsResponse {
        models: models.text_models(),
        default: models.default_id().to_string(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSummary {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    server_name: String,
    server_type: TransportKind,
}

impl From<&ToolDescriptor> for ToolSummary {
    fn from(tool: &ToolDescriptor) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            server_name: tool.server_name.clone(),
            server_type: tool.server_transport,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    model: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    servers: Vec<ServerSummary>,
    tools: Vec<ToolSummary>,
    current_model: String,
}

async fn status_handler(
    State(state): State<SharedState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let model = state.dispatcher.models().resolve(query.model.as_deref())?;
    let catalog = state.dispatcher.hub().initialize().await;

    Ok(Json(StatusResponse {
        servers: catalog.server_summaries(),
        tools: catalog.tools().iter().map(ToolSummary::from).collect(),
        current_model: model.id.clone(),
    }))
}

// ── Knowledge diagnostics ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KnowledgeTestResponse {
    timestamp: DateTime<Utc>,
    connection_test: ConnectionReport,
    server_status: Vec<ServerSummary>,
    available_tools: Vec<ToolSummary>,
    message: &'static str,
}

async fn knowledge_test_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let hub = state.dispatcher.hub();
    let catalog = hub.initialize().await;
    let report = hub.test_connection().await;
    info!(success = report.success, details = %report.details, "Knowledge connection test");

    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let message = if report.success {
        "Knowledge server connection test successful"
    } else {
        "Knowledge server connection test failed - check server logs for details"
    };

    (
        status,
        Json(KnowledgeTestResponse {
            timestamp: Utc::now(),
            connection_test: report,
            server_status: catalog.server_summaries(),
            available_tools: catalog.tools().iter().map(ToolSummary::from).collect(),
            message,
        }),
    )
}

#[derive(Debug, Deserialize)]
struct ContextRequest {
    #[serde(default)]
    query: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContextResponse {
    timestamp: DateTime<Utc>,
    query: String,
    context: String,
    context_length: usize,
    message: &'static str,
}

async fn knowledge_context_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ContextRequest>,
) -> Result<Json<ContextResponse>, ApiError> {
    if payload.query.trim().is_empty() {
        return Err(ApiError::bad_request("Query parameter required"));
    }

    let context = state.dispatcher.aggregator().gather(&payload.query).await;
    let context_length = context.text.chars().count();
    let message = if context_length > 0 {
        "Successfully retrieved documentation context"
    } else {
        "No relevant documentation context found"
    };

    Ok(Json(ContextResponse {
        timestamp: Utc::now(),
        query: payload.query,
        context: context.text,
        context_length,
        message,
    }))
}
