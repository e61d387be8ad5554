//! Knowledge server integration for Profesor.
//!
//! Speaks JSON-RPC over HTTP to remote tool hosts, keeps a catalog of the
//! tools they offer, picks at most one tool per query and folds its output
//! into prompt context.
//!
//! - [`client`]: endpoint probing, tool listing and invocation
//! - [`protocol`]: request shapes and response interpretation
//! - [`catalog`]: read-only tool snapshot
//! - [`policy`]: query to tool decision
//! - [`hub`]: shared owner of clients and catalog
//! - [`aggregator`]: never-failing context lookup

pub mod aggregator;
pub mod catalog;
pub mod client;
pub mod hub;
pub mod lazy;
pub mod policy;
pub mod protocol;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{AggregatedContext, CONTEXT_UNAVAILABLE, ContextAggregator, LookupOutcome};
pub use catalog::ToolCatalog;
pub use client::{ConnectionPhase, ConnectionReport, KnowledgeClient};
pub use hub::KnowledgeHub;
pub use policy::{ToolDecision, ToolKind, select_tool};
