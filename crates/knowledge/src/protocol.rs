//! JSON-RPC message shapes and response interpretation.
//!
//! Everything here is pure: the client does the I/O and hands raw status
//! codes and body text to these functions.

use profesor_core::error::KnowledgeError;
use profesor_core::knowledge::{KnowledgeServerDescriptor, ToolDescriptor, ToolInvocation, ToolResult};
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Protocol revision sent in the handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const CLIENT_NAME: &str = "El-Profesor";

type JsonObject = Map<String, Value>;

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    params: Value,
}

impl JsonRpcRequest {
    fn new(id: u64, method: &'static str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }

    pub fn initialize(id: u64) -> Self {
        Self::new(
            id,
            "initialize",
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": CLIENT_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        )
    }

    pub fn list_tools(id: u64) -> Self {
        Self::new(id, "tools/list", json!({}))
    }

    pub fn call_tool(id: u64, invocation: &ToolInvocation) -> Self {
        Self::new(
            id,
            "tools/call",
            json!({
                "name": invocation.name,
                "arguments": invocation.arguments,
            }),
        )
    }
}

/// Validate a raw HTTP response and parse its body as a JSON object.
pub fn parse_body(status: u16, text: &str) -> Result<JsonObject, KnowledgeError> {
    if !(200..300).contains(&status) {
        return Err(KnowledgeError::Http {
            status,
            body: preview(text, 200).to_string(),
        });
    }

    let trimmed = text.trim_start();
    if trimmed.starts_with("<!DOCTYPE") || trimmed.starts_with("<html") {
        return Err(KnowledgeError::HtmlResponse);
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(KnowledgeError::InvalidJson(
            "expected a JSON object".into(),
        )),
        Err(_) => Err(KnowledgeError::InvalidJson(preview(text, 200).to_string())),
    }
}

fn rpc_error(body: &JsonObject) -> Option<KnowledgeError> {
    let error = body.get("error").filter(|e| !e.is_null())?;
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    Some(KnowledgeError::Rpc {
        code: error.get("code").and_then(Value::as_i64),
        message,
    })
}

/// Extract `result.tools` from a `tools/list` response.
pub fn parse_tool_list(
    body: &JsonObject,
    server: &KnowledgeServerDescriptor,
) -> Result<Vec<ToolDescriptor>, KnowledgeError> {
    if let Some(err) = rpc_error(body) {
        return Err(err);
    }

    let tools = body
        .get("result")
        .and_then(|r| r.get("tools"))
        .and_then(Value::as_array)
        .ok_or(KnowledgeError::MissingField("result.tools"))?;

    Ok(tools
        .iter()
        .filter_map(|tool| {
            let name = tool.get("name")?.as_str()?;
            Some(ToolDescriptor {
                name: name.to_string(),
                description: tool
                    .get("description")
                    .and_then(Value::as_str)
                    .map(String::from),
                server_name: server.name.clone(),
                server_transport: server.transport,
            })
        })
        .collect())
}

fn fragment_text(item: &Value) -> String {
    if let Some(text) = item.get("text").and_then(Value::as_str) {
        return text.to_string();
    }
    if let Some(content) = item.get("content").and_then(Value::as_str) {
        return content.to_string();
    }
    match item {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten tool result content into one string.
///
/// Lists are joined with `\n` in their original order.
pub fn normalize_content(content: &Value) -> String {
    match content {
        Value::Array(items) => items
            .iter()
            .map(fragment_text)
            .collect::<Vec<_>>()
            .join("\n"),
        other => fragment_text(other),
    }
}

/// Turn a `tools/call` response body into a [`ToolResult`].
pub fn interpret_call_response(body: &JsonObject) -> ToolResult {
    if let Some(KnowledgeError::Rpc { message, .. }) = rpc_error(body) {
        return ToolResult::error(format!("MCP Error: {message}"));
    }

    match body
        .get("result")
        .and_then(|r| r.get("content"))
        .filter(|c| !c.is_null())
    {
        Some(content) => ToolResult::ok(normalize_content(content)),
        None => ToolResult::error("No content returned from knowledge server"),
    }
}

/// Tools assumed to exist when the server cannot be listed.
pub fn fallback_tools(server: &KnowledgeServerDescriptor) -> Vec<ToolDescriptor> {
    [
        ("search_documentation", "Search across all AWS documentation"),
        (
            "read_documentation",
            "Retrieve and convert AWS documentation pages to markdown",
        ),
        (
            "recommend",
            "Get content recommendations for AWS documentation pages",
        ),
        (
            "list_regions",
            "Retrieve a list of all AWS regions (Experimental)",
        ),
        (
            "get_regional_availability",
            "Retrieve AWS regional availability information (Experimental)",
        ),
    ]
    .into_iter()
    .map(|(name, description)| ToolDescriptor {
        name: name.into(),
        description: Some(description.into()),
        server_name: server.name.clone(),
        server_transport: server.transport,
    })
    .collect()
}

/// First `max` characters of `s`.
pub fn preview(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
