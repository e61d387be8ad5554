//! Best-effort context retrieval for a user query.
//!
//! [`ContextAggregator::gather`] never fails. Irrelevant queries cost
//! nothing; relevant ones wait a bounded time for the hub to initialize and
//! for the tool call, and any failure on the way (degraded server, tool error,
//! timeout, panic) collapses into [`CONTEXT_UNAVAILABLE`].

use std::sync::Arc;
use std::time::Duration;

use profesor_config::KnowledgeConfig;
use profesor_core::knowledge::ToolInvocation;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::catalog::ToolCatalog;
use crate::hub::KnowledgeHub;
use crate::policy::{ToolDecision, select_tool};

/// Context text used when a relevant lookup could not be completed.
pub const CONTEXT_UNAVAILABLE: &str = "Knowledge context unavailable: the documentation service could not be reached for this question. Answer from general knowledge and mention that live documentation was not consulted.";

/// How a lookup ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Disabled,
    NotRelevant,
    NoTool,
    Retrieved,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedContext {
    pub text: String,
    /// Set only when a tool ran and returned content.
    pub decision: Option<ToolDecision>,
    pub outcome: LookupOutcome,
}

impl AggregatedContext {
    fn empty(outcome: LookupOutcome) -> Self {
        Self {
            text: String::new(),
            decision: None,
            outcome,
        }
    }

    fn unavailable() -> Self {
        Self {
            text: CONTEXT_UNAVAILABLE.to_string(),
            decision: None,
            outcome: LookupOutcome::Unavailable,
        }
    }

    pub fn has_context(&self) -> bool {
        !self.text.is_empty()
    }
}

pub struct ContextAggregator {
    hub: Arc<KnowledgeHub>,
    relevance_keywords: Vec<String>,
    enabled: bool,
    timeout: Duration,
}

impl ContextAggregator {
    pub fn new(
        hub: Arc<KnowledgeHub>,
        relevance_keywords: Vec<String>,
        enabled: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            hub,
            relevance_keywords: relevance_keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect(),
            enabled,
            timeout,
        }
    }

    pub fn from_config(hub: Arc<KnowledgeHub>, config: &KnowledgeConfig) -> Self {
        Self::new(
            hub,
            config.relevance_keywords.clone(),
            config.enabled,
            Duration::from_secs(config.lookup_timeout_secs),
        )
    }

    pub fn hub(&self) -> &Arc<KnowledgeHub> {
        &self.hub
    }

    /// Cheap pre-filter; coarser than tool selection.
    pub fn is_relevant(&self, query: &str) -> bool {
        let lower = query.to_lowercase();
        self.relevance_keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    pub async fn gather(&self, query: &str) -> AggregatedContext {
        if !self.enabled {
            return AggregatedContext::empty(LookupOutcome::Disabled);
        }
        if !self.is_relevant(query) {
            debug!("Query not relevant to knowledge servers");
            return AggregatedContext::empty(LookupOutcome::NotRelevant);
        }

        let deadline = Instant::now() + self.timeout;

        // Detached: a caller that gives up must not cut the probe short.
        let init_hub = self.hub.clone();
        let init = tokio::spawn(async move { init_hub.initialize().await });
        let catalog = match tokio::time::timeout_at(deadline, init).await {
            Ok(Ok(catalog)) => catalog,
            Ok(Err(e)) => {
                warn!(error = %e, "Knowledge initialization task failed");
                return AggregatedContext::unavailable();
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs_f32(),
                    "Knowledge servers still initializing, continuing without context"
                );
                return AggregatedContext::unavailable();
            }
        };

        let hub = self.hub.clone();
        let owned_query = query.to_string();
        let mut task = tokio::spawn(async move { lookup(&hub, &catalog, &owned_query).await });

        match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(context)) => context,
            Ok(Err(e)) => {
                warn!(error = %e, "Knowledge lookup task failed");
                AggregatedContext::unavailable()
            }
            Err(_) => {
                task.abort();
                warn!(timeout_secs = self.timeout.as_secs_f32(), "Knowledge lookup timed out");
                AggregatedContext::unavailable()
            }
        }
    }
}

async fn lookup(hub: &KnowledgeHub, catalog: &ToolCatalog, query: &str) -> AggregatedContext {
    let decision = select_tool(query, catalog);
    debug!(reasoning = %decision.reasoning, "Tool decision");

    let (Some(kind), Some(tool_id)) = (decision.kind, decision.tool_id.as_deref()) else {
        return AggregatedContext::empty(LookupOutcome::NoTool);
    };
    let Some(arguments) = kind.arguments(query) else {
        debug!(tool = %tool_id, "Query lacks arguments for selected tool");
        return AggregatedContext::empty(LookupOutcome::NoTool);
    };
    let Some(tool) = catalog.get(tool_id) else {
        return AggregatedContext::empty(LookupOutcome::NoTool);
    };

    let result = hub
        .invoke(tool, &ToolInvocation::new(tool_id, arguments))
        .await;
    if result.is_error || result.content.trim().is_empty() {
        warn!(tool = %tool_id, message = %result.content, "Knowledge tool returned no usable content");
        return AggregatedContext::unavailable();
    }

    info!(tool = %tool_id, chars = result.content.len(), "Retrieved knowledge context");
    AggregatedContext {
        text: format!("Documentation context from {}:\n{}", tool.server_name, result.content),
        decision: Some(decision),
        outcome: LookupOutcome::Retrieved,
    }
}
