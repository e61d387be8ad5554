//! Read-only snapshot of the tools offered by configured servers.

use profesor_core::knowledge::{KnowledgeServerDescriptor, ServerSummary, ToolDescriptor};

use crate::policy::ToolKind;

#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    servers: Vec<KnowledgeServerDescriptor>,
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    pub fn new(servers: Vec<KnowledgeServerDescriptor>, tools: Vec<ToolDescriptor>) -> Self {
        Self { servers, tools }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tool_count(&self, server_name: &str) -> usize {
        self.tools
            .iter()
            .filter(|t| t.server_name == server_name)
            .count()
    }

    /// One entry per configured server, including unconnected ones.
    pub fn server_summaries(&self) -> Vec<ServerSummary> {
        self.servers
            .iter()
            .map(|server| ServerSummary {
                name: server.name.clone(),
                transport: server.transport,
                url: server.base_url.clone(),
                tool_count: self.tool_count(&server.name),
            })
            .collect()
    }

    /// First tool whose name maps to `kind`.
    pub fn find_kind(&self, kind: ToolKind) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| kind.matches(&t.name))
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }
}
