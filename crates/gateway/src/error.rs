//! Mapping from domain errors to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use profesor_core::error::{Error, GenerationError, GenerationErrorKind, ValidationError};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<GenerationErrorKind>,
}

/// Error returned by handlers, rendered as `{error, kind?}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: message.into(),
                kind: None,
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        warn!(error = %err, "Rejected request");
        Self::bad_request(err.to_string())
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        let kind = err.kind();
        let status = match kind {
            GenerationErrorKind::Quota => StatusCode::TOO_MANY_REQUESTS,
            GenerationErrorKind::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            GenerationErrorKind::Cancelled | GenerationErrorKind::General => StatusCode::BAD_GATEWAY,
        };
        error!(error = %err, kind = ?kind, "Generation failed");
        Self {
            status,
            body: ErrorBody {
                error: err.to_string(),
                kind: Some(kind),
            },
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(e) => e.into(),
            Error::Generation(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::from(Error::from(ValidationError::EmptyMessage)).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(GenerationError::QuotaExceeded {
                message: "quota".into(),
                retry_after_secs: None
            })
            .status,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::from(GenerationError::ModelUnavailable("m".into())).status,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(GenerationError::Network("reset".into())).status,
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn validation_body_has_no_kind() {
        let err = ApiError::from(ValidationError::EmptyMessage);
        let json = serde_json::to_value(&err.body).unwrap();
        assert!(json.get("kind").is_none());
        assert_eq!(json["error"], "Message content cannot be empty");
    }
}
