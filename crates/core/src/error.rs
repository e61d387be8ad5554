//! Error types for the Profesor domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; only validation and
//! generation errors ever reach a caller. Knowledge errors are absorbed
//! inside the knowledge crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all Profesor operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Inbound request errors ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Generation errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),
}

// --- Bounded context errors ---

/// A malformed inbound chat request. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Message content cannot be empty")]
    EmptyMessage,

    #[error("Message content too long ({length} characters, max {max})")]
    MessageTooLong { length: usize, max: usize },

    #[error("Invalid AI model: {0}")]
    UnknownModel(String),

    #[error("Model '{0}' cannot be used for chat")]
    UnsupportedModel(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Stable classification of generation failures.
///
/// This is the contract at the generation boundary: providers decide the
/// kind from structured data (HTTP status) and callers present
/// differentiated guidance without parsing message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationErrorKind {
    Quota,
    ModelUnavailable,
    Cancelled,
    General,
}

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Quota exceeded: {message}")]
    QuotaExceeded {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// The stable kind of this failure.
    pub fn kind(&self) -> GenerationErrorKind {
        match self {
            Self::QuotaExceeded { .. } => GenerationErrorKind::Quota,
            Self::ModelUnavailable(_) => GenerationErrorKind::ModelUnavailable,
            Self::Cancelled => GenerationErrorKind::Cancelled,
            _ => GenerationErrorKind::General,
        }
    }

    /// Build an error from a provider's HTTP status and body.
    ///
    /// The status decides the kind; the body is only inspected when the
    /// status alone is ambiguous (some gateways report quota problems as
    /// 400 or 403 with an explanatory body).
    pub fn from_status(status_code: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        match status_code {
            429 => Self::QuotaExceeded {
                message,
                retry_after_secs: None,
            },
            404 => Self::ModelUnavailable(message),
            401 => Self::AuthenticationFailed(message),
            403 => match Self::from_provider_text(status_code, message) {
                Self::ApiError { message, .. } => Self::AuthenticationFailed(message),
                other => other,
            },
            _ => Self::from_provider_text(status_code, message),
        }
    }

    /// Best-effort classification from provider error text.
    ///
    /// Legacy behavior kept for providers that do not report a usable
    /// status code. Prefer [`GenerationError::from_status`].
    pub fn from_provider_text(status_code: u16, message: String) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("quota")
            || lower.contains("rate limit")
            || lower.contains("resource_exhausted")
        {
            Self::QuotaExceeded {
                message,
                retry_after_secs: None,
            }
        } else if lower.contains("model") && (lower.contains("not found") || lower.contains("unavailable")) {
            Self::ModelUnavailable(message)
        } else {
            Self::ApiError {
                status_code,
                message,
            }
        }
    }
}

/// Failures while talking to a knowledge server.
///
/// Always recovered locally: they select fallback data or empty context,
/// and are never surfaced as a request failure.
#[derive(Debug, Clone, Error)]
pub enum KnowledgeError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Received HTML response instead of JSON")]
    HtmlResponse,

    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("Knowledge server error: {message}")]
    Rpc { code: Option<i64>, message: String },

    #[error("Response missing expected field '{0}'")]
    MissingField(&'static str),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Knowledge server not ready")]
    NotReady,
}
