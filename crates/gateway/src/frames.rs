//! SSE framing for chat streams.
//!
//! Two wire formats share one event stream: the chat format
//! (`{type: "ai_chunk" | "tool_used" | "complete" | "error", ...}`) and
//! the legacy message format (`{content}`, `[DONE]`, `{error}`).

use std::convert::Infallible;

use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt, future};
use profesor_agent::{EventStream, StreamEvent};
use profesor_core::error::GenerationErrorKind;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatFrame<'a> {
    AiChunk {
        content: &'a str,
    },
    ToolUsed {
        tool: &'a str,
        reasoning: &'a str,
    },
    Complete,
    Error {
        error: &'a str,
        kind: GenerationErrorKind,
    },
}

impl<'a> From<&'a StreamEvent> for ChatFrame<'a> {
    fn from(event: &'a StreamEvent) -> Self {
        match event {
            StreamEvent::Content { text } => Self::AiChunk { content: text },
            StreamEvent::ToolUsed { tool, reasoning } => Self::ToolUsed { tool, reasoning },
            StreamEvent::Complete => Self::Complete,
            StreamEvent::Error { message, kind } => Self::Error {
                error: message,
                kind: *kind,
            },
        }
    }
}

/// Data line for the chat format.
pub fn chat_frame(event: &StreamEvent) -> Option<String> {
    serde_json::to_string(&ChatFrame::from(event)).ok()
}

/// Data line for the legacy format. Tool notices are not part of it.
pub fn legacy_frame(event: &StreamEvent) -> Option<String> {
    match event {
        StreamEvent::Content { text } => Some(serde_json::json!({ "content": text }).to_string()),
        StreamEvent::ToolUsed { .. } => None,
        StreamEvent::Complete => Some("[DONE]".to_string()),
        StreamEvent::Error { message, .. } => Some(serde_json::json!({ "error": message }).to_string()),
    }
}

/// Wrap an event stream as an SSE response body.
///
/// The response owns the stream, so a disconnecting client drops it and
/// cancels generation.
pub fn sse(
    events: EventStream,
    frame: fn(&StreamEvent) -> Option<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let frames = events.filter_map(move |event| {
        future::ready(frame(&event).map(|data| Ok(Event::default().data(data))))
    });
    Sse::new(frames)
}
