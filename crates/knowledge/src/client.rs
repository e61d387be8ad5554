//! HTTP client for one knowledge server.
//!
//! The client probes a list of endpoint suffixes once, remembers the first
//! that answers with JSON, and then lists and invokes tools against it.
//! No method returns a transport error: listing falls back to a static
//! tool set and invocation failures become error results.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use profesor_core::error::KnowledgeError;
use profesor_core::knowledge::{KnowledgeServerDescriptor, ToolDescriptor, ToolInvocation, ToolResult};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::lazy::LazySlot;
use crate::protocol::{self, JsonRpcRequest};

/// Settled outcome of endpoint probing.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ClientState {
    Ready { endpoint: String },
    Degraded { reason: String },
}

/// Observable connection state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionPhase {
    Uninitialized,
    Probing,
    Ready { endpoint: String },
    Degraded { reason: String },
}

impl From<ClientState> for ConnectionPhase {
    fn from(state: ClientState) -> Self {
        match state {
            ClientState::Ready { endpoint } => Self::Ready { endpoint },
            ClientState::Degraded { reason } => Self::Degraded { reason },
        }
    }
}

/// Result of a diagnostic connection check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    pub success: bool,
    pub details: String,
}

/// Marks a probe in flight; cleared on drop, including when the probe
/// future is cancelled.
struct ProbingGuard<'a>(&'a AtomicBool);

impl<'a> ProbingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ProbingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct KnowledgeClient {
    descriptor: KnowledgeServerDescriptor,
    probe_paths: Vec<String>,
    http: reqwest::Client,
    next_id: AtomicU64,
    state: LazySlot<ClientState>,
    probing: AtomicBool,
}

impl KnowledgeClient {
    pub fn new(descriptor: KnowledgeServerDescriptor, probe_paths: Vec<String>) -> Self {
        let mut headers = HeaderMap::new();
        for (name, value) in &descriptor.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(server = %descriptor.name, header = %name, "Skipping invalid header"),
            }
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(descriptor.timeout)
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            descriptor,
            probe_paths,
            http,
            next_id: AtomicU64::new(1),
            state: LazySlot::new(),
            probing: AtomicBool::new(false),
        }
    }

    pub fn descriptor(&self) -> &KnowledgeServerDescriptor {
        &self.descriptor
    }

    /// Current state; never blocks.
    pub fn phase(&self) -> ConnectionPhase {
        match self.state.get() {
            Some(state) => state.into(),
            None if self.probing.load(Ordering::SeqCst) => ConnectionPhase::Probing,
            None => ConnectionPhase::Uninitialized,
        }
    }

    /// Probe for a working endpoint. Runs at most once until [`cleanup`].
    ///
    /// [`cleanup`]: KnowledgeClient::cleanup
    pub async fn initialize(&self) -> ConnectionPhase {
        self.state.get_or_init(|| self.probe()).await.into()
    }

    /// Forget the adopted endpoint; the next call probes again.
    pub fn cleanup(&self) {
        self.state.reset();
        self.probing.store(false, Ordering::SeqCst);
        debug!(server = %self.descriptor.name, "Knowledge client reset");
    }

    async fn probe(&self) -> ClientState {
        let _probing = ProbingGuard::enter(&self.probing);
        info!(server = %self.descriptor.name, url = %self.descriptor.base_url, "Probing knowledge server");

        let mut last_error = String::from("no candidate endpoints configured");
        for suffix in &self.probe_paths {
            let endpoint = format!("{}{}", self.descriptor.base_url, suffix);
            let request = JsonRpcRequest::initialize(self.next_id());
            match self.post(&endpoint, &request).await {
                Ok(_) => {
                    info!(server = %self.descriptor.name, endpoint = %endpoint, "Knowledge endpoint ready");
                    return ClientState::Ready { endpoint };
                }
                Err(e) => {
                    debug!(endpoint = %endpoint, error = %e, "Endpoint probe failed");
                    last_error = format!("{endpoint}: {e}");
                }
            }
        }

        warn!(
            server = %self.descriptor.name,
            reason = %last_error,
            "All endpoint probes failed, using fallback tools"
        );
        ClientState::Degraded { reason: last_error }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn post(
        &self,
        url: &str,
        request: &JsonRpcRequest,
    ) -> Result<serde_json::Map<String, serde_json::Value>, KnowledgeError> {
        debug!(url = %url, method = request.method, id = request.id, "Knowledge request");

        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!(status, body = %protocol::preview(&text, 200), "Knowledge response");

        protocol::parse_body(status, &text)
    }

    fn transport_error(&self, e: reqwest::Error) -> KnowledgeError {
        if e.is_timeout() {
            KnowledgeError::Timeout(self.descriptor.timeout.as_secs())
        } else {
            KnowledgeError::Network(e.to_string())
        }
    }

    fn endpoint(&self) -> Option<String> {
        match self.state.get()? {
            ClientState::Ready { endpoint } => Some(endpoint),
            ClientState::Degraded { .. } => None,
        }
    }

    async fn fetch_tools(&self) -> Result<Vec<ToolDescriptor>, KnowledgeError> {
        if let ConnectionPhase::Degraded { reason } = self.initialize().await {
            return Err(KnowledgeError::Network(reason));
        }
        let endpoint = self.endpoint().ok_or(KnowledgeError::NotReady)?;
        let body = self
            .post(&endpoint, &JsonRpcRequest::list_tools(self.next_id()))
            .await?;
        protocol::parse_tool_list(&body, &self.descriptor)
    }

    /// Tools offered by the server, or the static fallback set.
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        match self.fetch_tools().await {
            Ok(tools) => {
                info!(server = %self.descriptor.name, count = tools.len(), "Listed knowledge tools");
                tools
            }
            Err(e) => {
                warn!(server = %self.descriptor.name, error = %e, "Could not list tools, using fallback");
                protocol::fallback_tools(&self.descriptor)
            }
        }
    }

    /// Run a tool. Failures are reported as error results.
    pub async fn invoke_tool(&self, invocation: &ToolInvocation) -> ToolResult {
        let Some(endpoint) = self.endpoint() else {
            debug!(tool = %invocation.name, "Knowledge server not ready, skipping call");
            return ToolResult::error(KnowledgeError::NotReady.to_string());
        };

        info!(server = %self.descriptor.name, tool = %invocation.name, "Invoking knowledge tool");
        let request = JsonRpcRequest::call_tool(self.next_id(), invocation);
        match self.post(&endpoint, &request).await {
            Ok(body) => {
                let result = protocol::interpret_call_response(&body);
                if result.is_error {
                    warn!(tool = %invocation.name, message = %result.content, "Tool call failed");
                }
                result
            }
            Err(e) => {
                warn!(tool = %invocation.name, error = %e, "Tool call failed");
                ToolResult::error(format!(
                    "Currently unable to access the knowledge server: {e}"
                ))
            }
        }
    }

    /// List tools against the live server and describe the outcome.
    pub async fn test_connection(&self) -> ConnectionReport {
        match self.fetch_tools().await {
            Ok(tools) => ConnectionReport {
                success: true,
                details: format!(
                    "Successfully connected. Found {} tools: {}",
                    tools.len(),
                    tools
                        .iter()
                        .map(|t| t.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            },
            Err(e) => ConnectionReport {
                success: false,
                details: format!("Connection failed: {e}"),
            },
        }
    }
}
