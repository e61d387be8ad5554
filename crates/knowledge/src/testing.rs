//! In-process fake knowledge server for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

type Handler = dyn Fn(&str, &Value) -> (u16, String) + Send + Sync;

/// Decides the reply for a `(path, request)` pair.
#[derive(Clone)]
pub(crate) struct Responder(Arc<Handler>);

impl Responder {
    pub fn new(f: impl Fn(&str, &Value) -> (u16, String) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn always(status: u16, body: &'static str) -> Self {
        Self::new(move |_, _| (status, body.to_string()))
    }

    /// A well-behaved server answering only on `path`.
    pub fn mcp_at(path: &'static str) -> Self {
        let wanted = if path.is_empty() { "/" } else { path };
        Self::new(move |seen, request| {
            if seen != wanted {
                return (404, "Not Found".into());
            }
            (200, mcp_reply(request).to_string())
        })
    }
}

fn text(s: String) -> Value {
    json!([{ "type": "text", "text": s }])
}

fn mcp_reply(request: &Value) -> Value {
    let id = request["id"].clone();
    let arg = |key: &str| request["params"]["arguments"][key].as_str().unwrap_or("").to_string();

    let result = match request["method"].as_str().unwrap_or("") {
        "initialize" => json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "fake-knowledge", "version": "0.0.1" }
        }),
        "tools/list" => json!({
            "tools": [
                { "name": "aws___search_documentation", "description": "Search" },
                { "name": "aws___read_documentation", "description": "Read" },
                { "name": "aws___recommend", "description": "Recommend" },
                { "name": "aws___list_regions", "description": "Regions" },
                { "name": "aws___get_regional_availability", "description": "Availability" }
            ]
        }),
        "tools/call" => {
            let name = request["params"]["name"].as_str().unwrap_or("");
            let content = match name {
                "aws___search_documentation" => json!([
                    { "type": "text", "text": format!("Result for {}", arg("search_phrase")) },
                    { "type": "text", "text": "See also: docs" }
                ]),
                "aws___read_documentation" => text(format!("Page {}", arg("url"))),
                "aws___recommend" => text(format!("Related to {}", arg("url"))),
                "aws___list_regions" => json!("us-east-1\neu-west-1"),
                "aws___get_regional_availability" => {
                    text(format!("resource_type={}", arg("resource_type")))
                }
                _ => {
                    return json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": { "code": -32601, "message": format!("Unknown tool: {name}") }
                    });
                }
            };
            json!({ "content": content })
        }
        other => {
            return json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("Unknown method: {other}") }
            });
        }
    };

    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

#[derive(Clone)]
struct FakeState {
    responder: Responder,
    delay: Duration,
    hits: Arc<AtomicUsize>,
    initialize_hits: Arc<AtomicUsize>,
    paths: Arc<Mutex<Vec<String>>>,
}

pub(crate) struct FakeServer {
    pub base_url: String,
    state: FakeState,
}

impl FakeServer {
    pub async fn spawn(responder: Responder) -> Self {
        Self::spawn_with_delay(responder, Duration::ZERO).await
    }

    pub async fn spawn_with_delay(responder: Responder, delay: Duration) -> Self {
        let state = FakeState {
            responder,
            delay,
            hits: Arc::new(AtomicUsize::new(0)),
            initialize_hits: Arc::new(AtomicUsize::new(0)),
            paths: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new().fallback(handle).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn initialize_hits(&self) -> usize {
        self.state.initialize_hits.load(Ordering::SeqCst)
    }

    pub fn paths_seen(&self) -> Vec<String> {
        self.state.paths.lock().unwrap().clone()
    }
}

async fn handle(State(state): State<FakeState>, uri: Uri, body: String) -> Response {
    let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    state.hits.fetch_add(1, Ordering::SeqCst);
    if request["method"] == "initialize" {
        state.initialize_hits.fetch_add(1, Ordering::SeqCst);
    }
    state.paths.lock().unwrap().push(uri.path().to_string());

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    let (status, reply) = (state.responder.0)(uri.path(), &request);
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], reply).into_response()
}
