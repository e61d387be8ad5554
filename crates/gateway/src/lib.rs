//! HTTP API gateway for Profesor.
//!
//! Exposes the chat endpoints (direct JSON and SSE streaming), model and
//! knowledge-server status, and knowledge diagnostics.
//!
//! Built on Axum; every request goes through trace logging, CORS and a
//! body size limit.

pub mod api;
pub mod error;
pub mod frames;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use profesor_agent::ChatDispatcher;
use profesor_config::{AppConfig, GatewayConfig};
use profesor_knowledge::KnowledgeHub;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub dispatcher: Arc<ChatDispatcher>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the full router with all layers.
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .merge(api::api_router(state))
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

/// Empty `allowed_origins` allows any origin.
fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let allow_origin = if config.allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Start the gateway HTTP server and run until Ctrl-C.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let providers = profesor_providers::router::build_from_config(&config);
    let provider = providers
        .default()
        .ok_or("No default provider configured")?;
    if !config.has_api_key() {
        warn!("No API key configured; generation requests will fail until one is set");
    }

    let hub = Arc::new(KnowledgeHub::from_config(&config.knowledge));
    let dispatcher = Arc::new(ChatDispatcher::from_config(&config, provider, hub.clone()));
    let app = build_router(Arc::new(GatewayState { dispatcher }), &config.gateway);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, model = %config.default_model, "Gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    hub.cleanup();
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use profesor_core::error::GenerationError;
    use profesor_core::knowledge::{KnowledgeServerDescriptor, TransportKind};
    use profesor_core::message::Message;
    use profesor_core::provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
    use std::collections::BTreeMap;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    /// Lightweight mock provider for gateway tests.
    struct MockProvider {
        fragments: Vec<&'static str>,
        failure: Option<GenerationError>,
    }

    impl MockProvider {
        fn answering(fragments: Vec<&'static str>) -> Self {
            Self {
                fragments,
                failure: None,
            }
        }

        fn failing(error: GenerationError) -> Self {
            Self {
                fragments: vec![],
                failure: Some(error),
            }
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "gateway_mock"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, GenerationError> {
            if let Some(e) = &self.failure {
                return Err(e.clone());
            }
            Ok(ProviderResponse {
                message: Message::assistant(self.fragments.concat()),
                usage: None,
                model: request.model,
            })
        }

        async fn stream(
            &self,
            _request: ProviderRequest,
        ) -> Result<mpsc::Receiver<Result<StreamChunk, GenerationError>>, GenerationError> {
            if let Some(e) = &self.failure {
                return Err(e.clone());
            }
            let (tx, rx) = mpsc::channel(self.fragments.len() + 1);
            for fragment in &self.fragments {
                tx.try_send(Ok(StreamChunk::text(*fragment))).unwrap();
            }
            Ok(rx)
        }
    }

    fn app_with(provider: MockProvider, servers: Vec<KnowledgeServerDescriptor>) -> Router {
        let config = AppConfig::default();
        let hub = Arc::new(KnowledgeHub::new(servers, vec![]));
        let dispatcher = Arc::new(ChatDispatcher::from_config(&config, Arc::new(provider), hub));
        build_router(Arc::new(GatewayState { dispatcher }), &config.gateway)
    }

    fn app() -> Router {
        app_with(MockProvider::answering(vec!["Hel", "lo"]), vec![])
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    fn data_lines(body: &str) -> Vec<String> {
        body.lines()
            .filter_map(|l| l.strip_prefix("data: "))
            .map(String::from)
            .collect()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn direct_chat() {
        let response = app()
            .oneshot(post_json("/chat", serde_json::json!({ "message": "Say hello" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["response"], "Hello");
        assert_eq!(json["model"], "gemini-2.5-flash-lite");
        assert_eq!(json["hasContext"], false);
        assert!(json.get("toolUsed").is_none());
    }

    #[tokio::test]
    async fn streaming_chat_frames() {
        let response = app()
            .oneshot(post_json(
                "/chat",
                serde_json::json!({ "message": "Say hello", "useStreaming": true }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        let lines = data_lines(&body_text(response).await);
        assert_eq!(
            lines,
            vec![
                r#"{"type":"ai_chunk","content":"Hel"}"#,
                r#"{"type":"ai_chunk","content":"lo"}"#,
                r#"{"type":"complete"}"#,
            ]
        );
    }

    #[tokio::test]
    async fn streaming_failure_is_error_frame() {
        let app = app_with(
            MockProvider::failing(GenerationError::QuotaExceeded {
                message: "Resource exhausted".into(),
                retry_after_secs: None,
            }),
            vec![],
        );
        let response = app
            .oneshot(post_json(
                "/chat",
                serde_json::json!({ "message": "hi", "useStreaming": true }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let lines = data_lines(&body_text(response).await);
        assert_eq!(lines.len(), 1);
        let frame: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(frame["type"], "error");
        assert_eq!(frame["kind"], "quota");
    }

    #[tokio::test]
    async fn legacy_message_stream_ends_with_done() {
        let response = app()
            .oneshot(post_json("/chat/message", serde_json::json!({ "message": "hi" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let lines = data_lines(&body_text(response).await);
        assert_eq!(lines, vec![r#"{"content":"Hel"}"#, r#"{"content":"lo"}"#, "[DONE]"]);
    }

    #[tokio::test]
    async fn validation_errors_are_400() {
        let cases = [
            serde_json::json!({ "message": "   " }),
            serde_json::json!({}),
            serde_json::json!({ "message": "hi", "model": "nope" }),
            serde_json::json!({ "message": "hi", "temperature": 3.0 }),
            serde_json::json!({ "message": "hi", "useStreaming": true, "topP": 2.0 }),
        ];
        for body in cases {
            let response = app().oneshot(post_json("/chat", body.clone())).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            let json = body_json(response).await;
            assert!(json["error"].is_string());
        }
    }

    #[tokio::test]
    async fn direct_generation_errors_map_status() {
        let app = app_with(
            MockProvider::failing(GenerationError::ModelUnavailable("gemini-2.5-pro".into())),
            vec![],
        );
        let response = app
            .oneshot(post_json("/chat", serde_json::json!({ "message": "hi" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["kind"], "model_unavailable");
    }

    #[tokio::test]
    async fn models_endpoint() {
        let response = app().oneshot(get("/models")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["default"], "gemini-2.5-flash-lite");
        let models = json["models"].as_array().unwrap();
        assert_eq!(models.len(), 3);
        assert!(models.iter().all(|m| m["id"].as_str().is_some()));
        assert!(models.iter().any(|m| m["isDefault"] == true));
    }

    #[tokio::test]
    async fn status_lists_unconnected_servers() {
        let servers = vec![KnowledgeServerDescriptor {
            name: "local-docs".into(),
            transport: TransportKind::Stdio,
            base_url: "docs-server".into(),
            headers: BTreeMap::new(),
            timeout: Duration::from_secs(1),
        }];
        let app = app_with(MockProvider::answering(vec!["x"]), servers);

        let response = app.oneshot(get("/status?model=gemini-2.5-pro")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["currentModel"], "gemini-2.5-pro");
        assert_eq!(json["servers"][0]["name"], "local-docs");
        assert_eq!(json["servers"][0]["type"], "stdio");
        assert_eq!(json["servers"][0]["toolCount"], 0);
        assert_eq!(json["tools"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn status_rejects_unknown_model() {
        let response = app().oneshot(get("/status?model=unknown")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn knowledge_test_without_servers_fails() {
        let response = app().oneshot(get("/knowledge/test")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["connectionTest"]["success"], false);
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn knowledge_context_endpoint() {
        let response = app()
            .oneshot(post_json(
                "/knowledge/context",
                serde_json::json!({ "query": "What's the weather today?" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["query"], "What's the weather today?");
        assert_eq!(json["contextLength"], 0);
        assert_eq!(json["context"], "");

        let response = app()
            .oneshot(post_json("/knowledge/context", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
