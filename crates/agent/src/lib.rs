//! Chat request handling for Profesor.
//!
//! One chat turn goes through the same steps whether it is answered
//! directly or streamed:
//!
//! 1. **Validate** the request and resolve the model
//! 2. **Gather context** from knowledge servers (never fails)
//! 3. **Assemble** the prompt from persona, context and question
//! 4. **Generate** through the configured provider, either awaiting the
//!    full answer or forwarding chunks through the stream multiplexer
//!
//! Streams always end with exactly one terminal event.

pub mod dispatcher;
pub mod models;
pub mod multiplexer;
pub mod prompt;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use dispatcher::{
    ChatDispatcher, ChatRequest, ChatResponse, DispatchSettings, ToolUsed, ValidatedChat,
};
pub use models::{ModelCatalog, ModelDescriptor};
pub use multiplexer::{ChunkReceiver, EventSink, EventStream, StreamMultiplexer};
pub use stream_event::StreamEvent;
