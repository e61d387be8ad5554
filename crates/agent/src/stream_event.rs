//! Events delivered to a streaming chat client.
//!
//! A stream carries any number of `Content` (and at most one leading
//! `ToolUsed`) followed by exactly one terminal event, `Complete` or
//! `Error`.

use profesor_core::error::{GenerationError, GenerationErrorKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A fragment of generated text, forwarded as soon as it arrives.
    Content { text: String },

    /// A knowledge tool supplied context for this answer.
    ToolUsed { tool: String, reasoning: String },

    /// Generation finished normally.
    Complete,

    /// Generation failed or was cancelled.
    Error {
        message: String,
        kind: GenerationErrorKind,
    },
}

impl StreamEvent {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content { text: text.into() }
    }

    pub fn error(err: &GenerationError) -> Self {
        Self::Error {
            message: err.to_string(),
            kind: err.kind(),
        }
    }

    pub fn cancelled() -> Self {
        Self::error(&GenerationError::Cancelled)
    }

    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Content { .. } => "content",
            Self::ToolUsed { .. } => "tool_used",
            Self::Complete => "complete",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_content() {
        let json = serde_json::to_string(&StreamEvent::content("Hello")).unwrap();
        assert!(json.contains(r#""type":"content""#));
        assert!(json.contains(r#""text":"Hello""#));
    }

    #[test]
    fn event_serialization_error_carries_kind() {
        let event = StreamEvent::error(&GenerationError::QuotaExceeded {
            message: "slow down".into(),
            retry_after_secs: None,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""kind":"quota""#));
    }

    #[test]
    fn terminal_events() {
        assert!(StreamEvent::Complete.is_terminal());
        assert!(StreamEvent::cancelled().is_terminal());
        assert!(!StreamEvent::content("x").is_terminal());
        assert!(
            !StreamEvent::ToolUsed {
                tool: "t".into(),
                reasoning: "r".into()
            }
            .is_terminal()
        );
    }

    #[test]
    fn cancelled_has_cancelled_kind() {
        match StreamEvent::cancelled() {
            StreamEvent::Error { kind, .. } => assert_eq!(kind, GenerationErrorKind::Cancelled),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn event_deserialization() {
        let event: StreamEvent = serde_json::from_str(r#"{"type":"complete"}"#).unwrap();
        assert_eq!(event, StreamEvent::Complete);
        assert_eq!(event.event_type(), "complete");
    }
}
