//! Error types for the realtime client and the push hub.
//!
//! [`RealtimeError`] is the client-side taxonomy. It never crosses the
//! connection manager's public contract as a fault: its `Display` text is
//! what the status surface shows. [`HubError`] is the server-side API error
//! and maps each variant to an HTTP status and a structured JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Failures observed by the realtime client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    /// The transport could not be established.
    #[error("transport open failure: {0}")]
    TransportOpenFailure(String),

    /// The transport closed without a deliberate local close.
    #[error("connection closed abnormally (code {})", close_code(.code))]
    AbnormalClose {
        /// Close code reported by the peer, if any.
        code: Option<u16>,
    },

    /// An inbound message could not be decoded.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Consecutive abnormal closures reached the configured cap.
    #[error("max attempts exceeded")]
    MaxRetriesExceeded,

    /// No authenticated identity is available to connect with.
    #[error("no authenticated identity")]
    AuthMissing,
}

impl RealtimeError {
    /// Returns `true` for failures recovered by the backoff/retry loop.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportOpenFailure(_) | Self::AbnormalClose { .. }
        )
    }
}

fn close_code(code: &Option<u16>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Structured JSON error response body.
///
/// ```json
/// { "error": { "code": 1001, "message": "invalid request: ...", "details": null } }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Push hub API errors.
///
/// | Range     | Category   | HTTP Status               |
/// |-----------|------------|---------------------------|
/// | 1000–1999 | Validation | 400 Bad Request           |
/// | 2000–2999 | Auth       | 403 Forbidden             |
/// | 3000–3999 | Server     | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The credential is missing, unknown, or belongs to another subject.
    #[error("credential rejected for subject {0}")]
    Forbidden(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Forbidden(_) => 2001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_retries_message_is_stable() {
        assert_eq!(
            RealtimeError::MaxRetriesExceeded.to_string(),
            "max attempts exceeded"
        );
    }

    #[test]
    fn abnormal_close_renders_code() {
        let err = RealtimeError::AbnormalClose { code: Some(1006) };
        assert_eq!(err.to_string(), "connection closed abnormally (code 1006)");
        let err = RealtimeError::AbnormalClose { code: None };
        assert_eq!(err.to_string(), "connection closed abnormally (code none)");
    }

    #[test]
    fn retryable_classification() {
        assert!(RealtimeError::TransportOpenFailure("refused".into()).is_retryable());
        assert!(RealtimeError::AbnormalClose { code: None }.is_retryable());
        assert!(!RealtimeError::MaxRetriesExceeded.is_retryable());
        assert!(!RealtimeError::MalformedMessage("eof".into()).is_retryable());
    }

    #[test]
    fn hub_error_maps_status() {
        assert_eq!(
            HubError::Forbidden("4".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(HubError::Forbidden("4".into()).error_code(), 2001);
        assert_eq!(
            HubError::InvalidRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
