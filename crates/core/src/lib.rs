//! # Profesor Core
//!
//! Domain types, traits, and error definitions for the Profesor chat service.
//! This crate has **no framework dependencies**: it defines the domain model
//! that the knowledge, provider, agent and gateway crates implement against.
//!
//! ## Layout
//!
//! - [`provider`]: the generation capability (`Provider` trait)
//! - [`knowledge`]: descriptors and values exchanged with knowledge servers
//! - [`error`]: the error taxonomy that crosses crate boundaries

pub mod error;
pub mod knowledge;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, GenerationError, GenerationErrorKind, KnowledgeError, ValidationError};
pub use knowledge::{
    KnowledgeServerDescriptor, ServerSummary, ToolDescriptor, ToolInvocation, ToolResult,
    TransportKind,
};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
