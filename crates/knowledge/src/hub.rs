//! Process-wide owner of knowledge clients and the tool catalog.
//!
//! Construct one hub at startup and share it behind an `Arc`. The catalog is
//! built lazily on first use, at most once, and rebuilt only after
//! [`KnowledgeHub::cleanup`].

use std::sync::Arc;

use futures::future::join_all;
use profesor_config::KnowledgeConfig;
use profesor_core::knowledge::{
    KnowledgeServerDescriptor, ToolDescriptor, ToolInvocation, ToolResult, TransportKind,
};
use tracing::{info, warn};

use crate::catalog::ToolCatalog;
use crate::client::{ConnectionReport, KnowledgeClient};
use crate::lazy::LazySlot;

pub struct KnowledgeHub {
    servers: Vec<KnowledgeServerDescriptor>,
    clients: Vec<Arc<KnowledgeClient>>,
    catalog: LazySlot<Arc<ToolCatalog>>,
}

impl KnowledgeHub {
    /// Only HTTP servers get a client; others are listed with zero tools.
    pub fn new(servers: Vec<KnowledgeServerDescriptor>, probe_paths: Vec<String>) -> Self {
        let clients = servers
            .iter()
            .filter(|s| {
                let supported = s.transport == TransportKind::Http;
                if !supported {
                    warn!(server = %s.name, transport = %s.transport, "Transport not supported, server will not be contacted");
                }
                supported
            })
            .map(|s| Arc::new(KnowledgeClient::new(s.clone(), probe_paths.clone())))
            .collect();

        Self {
            servers,
            clients,
            catalog: LazySlot::new(),
        }
    }

    pub fn from_config(config: &KnowledgeConfig) -> Self {
        Self::new(
            config.servers.iter().map(|s| s.descriptor()).collect(),
            config.probe_paths.clone(),
        )
    }

    pub fn servers(&self) -> &[KnowledgeServerDescriptor] {
        &self.servers
    }

    /// Build the catalog if needed and return it.
    pub async fn initialize(&self) -> Arc<ToolCatalog> {
        self.catalog
            .get_or_init(|| async {
                let lists = join_all(self.clients.iter().map(|c| c.list_tools())).await;
                let tools: Vec<ToolDescriptor> = lists.into_iter().flatten().collect();
                info!(servers = self.servers.len(), tools = tools.len(), "Knowledge catalog ready");
                Arc::new(ToolCatalog::new(self.servers.clone(), tools))
            })
            .await
    }

    /// The catalog, without triggering initialization.
    pub fn catalog_if_ready(&self) -> Option<Arc<ToolCatalog>> {
        self.catalog.get()
    }

    pub fn client_for(&self, server_name: &str) -> Option<Arc<KnowledgeClient>> {
        self.clients
            .iter()
            .find(|c| c.descriptor().name == server_name)
            .cloned()
    }

    /// Route an invocation to the server that published `tool`.
    pub async fn invoke(&self, tool: &ToolDescriptor, invocation: &ToolInvocation) -> ToolResult {
        match self.client_for(&tool.server_name) {
            Some(client) => client.invoke_tool(invocation).await,
            None => ToolResult::error(format!(
                "Knowledge server '{}' is not connected",
                tool.server_name
            )),
        }
    }

    /// Diagnostic check against the first connectable server.
    pub async fn test_connection(&self) -> ConnectionReport {
        match self.clients.first() {
            Some(client) => client.test_connection().await,
            None => ConnectionReport {
                success: false,
                details: "No HTTP knowledge server configured".into(),
            },
        }
    }

    /// Drop the catalog and every client's endpoint.
    pub fn cleanup(&self) {
        self.catalog.reset();
        for client in &self.clients {
            client.cleanup();
        }
        info!("Knowledge hub cleaned up");
    }
}
