//! Knowledge server domain types.
//!
//! A knowledge server is a remote tool host reached over JSON-RPC. These
//! types describe servers and the tools they expose; the protocol itself
//! lives in the `profesor-knowledge` crate.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a knowledge server is reached.
///
/// Only `Http` servers are ever connected; the other kinds are listed in
/// status summaries with zero tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    Sse,
    Stdio,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Sse => "sse",
            Self::Stdio => "stdio",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of one configured knowledge server.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeServerDescriptor {
    pub name: String,
    pub transport: TransportKind,
    pub base_url: String,
    /// Extra headers sent with every request, in a stable order.
    pub headers: BTreeMap<String, String>,
    /// Upper bound for each request to this server.
    pub timeout: Duration,
}

/// A tool offered by a knowledge server (live or fallback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub server_name: String,
    pub server_transport: TransportKind,
}

/// A single request to run a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// The outcome of a tool invocation.
///
/// Content is always one string. Failures are carried as `is_error`
/// results rather than `Err`, so callers can fold them into context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
        }
    }
}

/// Per-server line in a status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub transport: TransportKind,
    pub url: String,
    pub tool_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_kind_wire_names() {
        let kind: TransportKind = serde_json::from_str("\"stdio\"").unwrap();
        assert_eq!(kind, TransportKind::Stdio);
        assert_eq!(TransportKind::Http.to_string(), "http");
    }

    #[test]
    fn server_summary_uses_wire_names() {
        let summary = ServerSummary {
            name: "aws-knowledge".into(),
            transport: TransportKind::Http,
            url: "https://example.test".into(),
            tool_count: 5,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["type"], "http");
        assert_eq!(json["toolCount"], 5);
    }

    #[test]
    fn tool_result_constructors() {
        assert!(!ToolResult::ok("x").is_error);
        assert!(ToolResult::error("x").is_error);
    }
}
