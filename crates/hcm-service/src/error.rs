//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use hcm_core::{ErrorKind, HcmError};

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A control-plane operation failed.
    #[error("{kind}: {message}")]
    Operation {
        /// Error classification.
        kind: ErrorKind,
        /// Human-readable message.
        message: String,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

/// Status code for an operation failure of `kind`.
fn kind_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidParameter => StatusCode::BAD_REQUEST,
        ErrorKind::InvariantViolation | ErrorKind::Cancelled => StatusCode::CONFLICT,
        ErrorKind::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
        ErrorKind::StorageFailure => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized".to_string(),
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "not_found".to_string(),
                msg.clone(),
                None,
            ),
            Self::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "bad_request".to_string(),
                msg.clone(),
                None,
            ),
            Self::Operation { kind, message } => (
                kind_status(*kind),
                kind.as_str().to_string(),
                message.clone(),
                Some(serde_json::json!({ "retryable": kind.is_retryable() })),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error".to_string(),
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<HcmError> for ApiError {
    fn from(err: HcmError) -> Self {
        Self::Operation {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(kind_status(ErrorKind::InvalidParameter), StatusCode::BAD_REQUEST);
        assert_eq!(kind_status(ErrorKind::InvariantViolation), StatusCode::CONFLICT);
        assert_eq!(kind_status(ErrorKind::UpstreamUnavailable), StatusCode::BAD_GATEWAY);
        assert_eq!(
            kind_status(ErrorKind::StorageFailure),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn core_errors_keep_their_kind() {
        let err = ApiError::from(HcmError::invalid_parameter("bad scope"));
        assert!(matches!(
            err,
            ApiError::Operation {
                kind: ErrorKind::InvalidParameter,
                ..
            }
        ));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
