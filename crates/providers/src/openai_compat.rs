//! OpenAI-compatible provider implementation.
//!
//! Gemini is reached through Google's OpenAI-compatible endpoint, so this
//! one implementation covers the default backend as well as OpenAI,
//! OpenRouter and local servers.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Model listing and health checks
//!
//! Failures are classified by HTTP status into [`GenerationError`]
//! variants, so callers never need to inspect message text.

use async_trait::async_trait;
use futures::StreamExt;
use profesor_core::error::GenerationError;
use profesor_core::message::{Message, Role};
use profesor_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// An OpenAI-compatible generation provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                },
                content: Some(m.content.clone()),
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if let Some(top_p) = request.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        body
    }

    /// Send a chat completion request and classify non-success statuses.
    async fn send(
        &self,
        request: &ProviderRequest,
        stream: bool,
    ) -> Result<reqwest::Response, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(request, stream);

        debug!(provider = %self.name, model = %request.model, stream, "Sending completion request");

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let error_body = response.text().await.unwrap_or_default();
        warn!(
            provider = %self.name,
            status = status.as_u16(),
            body = %truncate(&error_body, 200),
            "Provider returned error"
        );

        let mut error = GenerationError::from_status(status.as_u16(), error_body);
        if let GenerationError::QuotaExceeded {
            retry_after_secs, ..
        } = &mut error
        {
            *retry_after_secs = retry_after;
        }
        Err(error)
    }
}

fn classify_transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout(e.to_string())
    } else {
        GenerationError::Network(e.to_string())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl profesor_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, GenerationError> {
        let response = self.send(&request, false).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| GenerationError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        let usage = api_response.usage.map(Usage::from);

        Ok(ProviderResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            usage,
            model: api_response.model.unwrap_or(request.model),
        })
    }

    async fn health_check(&self) -> Result<bool, GenerationError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(classify_transport_error)?;

        Ok(response.status().is_success())
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<StreamChunk, GenerationError>>, GenerationError>
    {
        let response = self.send(&request, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream and forward parsed chunks.
        // Every send checks for a dropped receiver so cancellation downstream
        // stops the HTTP read promptly.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = SseLineBuffer::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(GenerationError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for line in lines.push(&bytes) {
                    match parse_sse_line(&line) {
                        SseLine::Skip => {}
                        SseLine::Done => {
                            let _ = tx.send(Ok(StreamChunk::finished())).await;
                            return;
                        }
                        SseLine::Unparseable(data) => {
                            trace!(
                                provider = %provider_name,
                                data = %truncate(&data, 200),
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                        SseLine::Failed(error) => {
                            let _ = tx.send(Err(error)).await;
                            return;
                        }
                        SseLine::Chunk(chunk) => {
                            let done = chunk.done;
                            if tx.send(Ok(chunk)).await.is_err() {
                                debug!(provider = %provider_name, "Stream receiver dropped");
                                return;
                            }
                            if done {
                                return;
                            }
                        }
                    }
                }
            }

            // Stream ended without [DONE]
            let _ = tx.send(Ok(StreamChunk::finished())).await;
        });

        Ok(rx)
    }
}

/// Splits an incoming byte stream into complete SSE lines.
///
/// Bytes are held until a newline arrives, so a multibyte character split
/// across network reads is decoded whole.
#[derive(Default)]
struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw[..line_end]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }
}

/// What one SSE line means for the chunk stream.
#[derive(Debug)]
enum SseLine {
    Skip,
    Done,
    Chunk(StreamChunk),
    Failed(GenerationError),
    Unparseable(String),
}

fn parse_sse_line(line: &str) -> SseLine {
    // Skip empty lines and SSE comments
    if line.is_empty() || line.starts_with(':') {
        return SseLine::Skip;
    }

    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseLine::Done;
    }

    let parsed = match serde_json::from_str::<StreamResponse>(data) {
        Ok(parsed) => parsed,
        Err(_) => return SseLine::Unparseable(data.to_string()),
    };

    // Some gateways report mid-stream failures as an error payload
    if let Some(err) = parsed.error {
        let status = err.code.unwrap_or(500);
        return SseLine::Failed(GenerationError::from_status(status, err.message));
    }

    // Usage arrives on the final chunk, possibly next to the last delta
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|c| !c.is_empty());
    let usage = parsed.usage.map(Usage::from);
    if content.is_none() && usage.is_none() {
        return SseLine::Skip;
    }

    let done = usage.is_some();
    SseLine::Chunk(StreamChunk {
        content,
        done,
        usage,
    })
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use profesor_core::{GenerationErrorKind, Provider};

    #[test]
    fn constructor_trims_trailing_slash() {
        let provider = OpenAiCompatProvider::new("gemini", "http://localhost:9/v1/", "key");
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.base_url, "http://localhost:9/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn request_body_carries_sampling_parameters() {
        let request = ProviderRequest {
            model: "gemini-2.5-flash".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.4,
            top_p: Some(0.8),
            max_tokens: None,
            stream: true,
        };
        let body = OpenAiCompatProvider::request_body(&request, true);
        assert_eq!(body["stream"], true);
        assert!((body["top_p"].as_f64().unwrap() - 0.8).abs() < 1e-6);
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["stream_options"]["include_usage"], true);
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_stream_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        match parse_sse_line(line) {
            SseLine::Chunk(chunk) => {
                assert_eq!(chunk.content.as_deref(), Some("Hello"));
                assert!(!chunk.done);
            }
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn parse_stream_finish_chunk_is_skipped() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert!(matches!(parse_sse_line(line), SseLine::Skip));
    }

    #[test]
    fn parse_stream_done_marker() {
        assert!(matches!(parse_sse_line("data: [DONE]"), SseLine::Done));
        assert!(matches!(parse_sse_line(": keep-alive"), SseLine::Skip));
        assert!(matches!(parse_sse_line("event: message"), SseLine::Skip));
    }

    #[test]
    fn parse_stream_usage_ends_stream() {
        let line = r#"data: {"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        match parse_sse_line(line) {
            SseLine::Chunk(chunk) => {
                assert!(chunk.done);
                assert_eq!(chunk.usage.unwrap().total_tokens, 15);
            }
            other => panic!("expected usage chunk, got {other:?}"),
        }
    }

    #[test]
    fn parse_stream_final_delta_with_usage_keeps_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"final words"},"finish_reason":"stop"}],"usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#;
        match parse_sse_line(line) {
            SseLine::Chunk(chunk) => {
                assert_eq!(chunk.content.as_deref(), Some("final words"));
                assert!(chunk.done);
                assert_eq!(chunk.usage.unwrap().total_tokens, 5);
            }
            other => panic!("expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn parse_stream_error_payload_is_classified() {
        let line = r#"data: {"error":{"code":429,"message":"Resource has been exhausted"}}"#;
        match parse_sse_line(line) {
            SseLine::Failed(err) => assert_eq!(err.kind(), GenerationErrorKind::Quota),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn line_buffer_handles_split_lines() {
        let mut buffer = SseLineBuffer::default();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        let lines = buffer.push(b":1}\r\n\ndata: [DONE]\n");
        assert_eq!(lines, vec!["data: {\"a\":1}", "", "data: [DONE]"]);
    }

    #[test]
    fn line_buffer_keeps_multibyte_chars_split_across_reads() {
        let line = "data: ¿Qué?\n".as_bytes();
        // "¿" is two bytes; cut between them
        let cut = "data: ".len() + 1;
        let mut buffer = SseLineBuffer::default();
        assert!(buffer.push(&line[..cut]).is_empty());
        assert_eq!(buffer.push(&line[cut..]), vec!["data: ¿Qué?"]);
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "gemini-2.5-flash".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.7,
            top_p: None,
            max_tokens: None,
            stream: true,
        }
    }

    #[tokio::test]
    async fn quota_status_maps_to_quota_kind() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response() }),
        );
        let provider = OpenAiCompatProvider::new("test", serve(app).await, "key");
        let err = provider.stream(request()).await.unwrap_err();
        assert_eq!(err.kind(), GenerationErrorKind::Quota);
    }

    #[tokio::test]
    async fn health_check_reflects_models_endpoint() {
        use axum::routing::get;

        let app = Router::new().route("/models", get(|| async { "{\"data\":[]}" }));
        let healthy = OpenAiCompatProvider::new("test", serve(app).await, "key");
        assert!(healthy.health_check().await.unwrap());

        let app = Router::new().route(
            "/models",
            get(|| async { (StatusCode::UNAUTHORIZED, "bad key").into_response() }),
        );
        let rejected = OpenAiCompatProvider::new("test", serve(app).await, "key");
        assert!(!rejected.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn missing_model_maps_to_model_unavailable() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::NOT_FOUND, "no such model").into_response() }),
        );
        let provider = OpenAiCompatProvider::new("test", serve(app).await, "key");
        let err = provider.complete(request()).await.unwrap_err();
        assert_eq!(err.kind(), GenerationErrorKind::ModelUnavailable);
    }

    #[tokio::test]
    async fn streams_content_then_done() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async {
                let body = concat!(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
                    "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
                    "data: [DONE]\n\n",
                );
                ([("content-type", "text/event-stream")], body).into_response()
            }),
        );
        let provider = OpenAiCompatProvider::new("test", serve(app).await, "key");
        let mut rx = provider.stream(request()).await.unwrap();

        let mut text = String::new();
        let mut saw_done = false;
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.unwrap();
            if let Some(c) = chunk.content {
                text.push_str(&c);
            }
            saw_done |= chunk.done;
        }
        assert_eq!(text, "Hello");
        assert!(saw_done);
    }

    #[tokio::test]
    async fn streams_multibyte_text_split_between_reads() {
        use axum::body::{Body, Bytes};

        let app = Router::new().route(
            "/chat/completions",
            post(|| async {
                let payload = concat!(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"¿Qué?\"}}]}\n\n",
                    "data: [DONE]\n\n",
                )
                .as_bytes();
                let cut = payload.iter().position(|&b| b == 0xC2).unwrap() + 1;
                let parts = vec![
                    Bytes::copy_from_slice(&payload[..cut]),
                    Bytes::copy_from_slice(&payload[cut..]),
                ];
                let body = futures::stream::iter(parts).then(|part| async move {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Ok::<_, std::io::Error>(part)
                });
                ([("content-type", "text/event-stream")], Body::from_stream(body)).into_response()
            }),
        );
        let provider = OpenAiCompatProvider::new("test", serve(app).await, "key");
        let mut rx = provider.stream(request()).await.unwrap();

        let mut text = String::new();
        while let Some(chunk) = rx.recv().await {
            if let Some(c) = chunk.unwrap().content {
                text.push_str(&c);
            }
        }
        assert_eq!(text, "¿Qué?");
    }

    #[tokio::test]
    async fn streams_final_words_sent_with_usage() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async {
                let body = concat!(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"Almost \"}}]}\n\n",
                    "data: {\"choices\":[{\"delta\":{\"content\":\"done\"},\"finish_reason\":\"stop\"}],",
                    "\"usage\":{\"prompt_tokens\":1,\"completion_tokens\":2,\"total_tokens\":3}}\n\n",
                );
                ([("content-type", "text/event-stream")], body).into_response()
            }),
        );
        let provider = OpenAiCompatProvider::new("test", serve(app).await, "key");
        let mut rx = provider.stream(request()).await.unwrap();

        let mut text = String::new();
        let mut usage = None;
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.unwrap();
            if let Some(c) = chunk.content {
                text.push_str(&c);
            }
            usage = usage.or(chunk.usage);
        }
        assert_eq!(text, "Almost done");
        assert_eq!(usage.map(|u| u.total_tokens), Some(3));
    }
}
