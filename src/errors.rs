//! Application error model with HTTP response mapping
//!
//! Defines a typed error hierarchy using `thiserror` for internal error handling,
//! and maps each variant to an HTTP status plus a structured JSON body so callers
//! can branch on the `code` field.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Application error type
///
/// Covers all error cases the triage service may encounter. Each variant maps
/// to an HTTP status in [`AppError::status`].
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid user input (missing field, malformed id, bad config value)
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Resource not found (message id unknown to the mailbox)
    #[error("not found: {0}")]
    NotFound(String),
    /// OAuth token exchange or bearer token rejected
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    /// Upstream call exceeded the configured request timeout
    #[error("operation timed out: {0}")]
    Timeout(String),
    /// Mailbox API failure while listing or reading messages
    #[error("mailbox error: {0}")]
    Mailbox(String),
    /// Mailbox refused or failed to submit a reply
    #[error("send failed: {0}")]
    Send(String),
    /// Completion backend failure (network, HTTP status, empty candidates)
    #[error("completion failed: {0}")]
    Completion(String),
    /// Internal error (unexpected failure, external crate error)
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Convenience constructor for `InvalidInput`
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Stable machine-readable code included in error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::AuthFailed(_) => "auth_failed",
            Self::Timeout(_) => "timeout",
            Self::Mailbox(_) => "mailbox",
            Self::Send(_) => "send_failed",
            Self::Completion(_) => "completion",
            Self::Internal(_) => "internal",
        }
    }

    /// HTTP status for this error
    ///
    /// # Mappings
    ///
    /// - `InvalidInput` → 400
    /// - `NotFound` → 404
    /// - `AuthFailed`, `Mailbox`, `Send`, `Completion` → 502
    /// - `Timeout` → 504
    /// - `Internal` → 500
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AuthFailed(_) | Self::Mailbox(_) | Self::Send(_) | Self::Completion(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Re-tag a mailbox failure as a send failure
    ///
    /// Timeouts and auth failures keep their own variant.
    pub fn into_send(self) -> Self {
        match self {
            Self::Mailbox(msg) | Self::NotFound(msg) | Self::Internal(msg) => Self::Send(msg),
            other => other,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(code = self.code(), "request failed: {self}");
        }
        (
            status,
            Json(json!({ "error": self.to_string(), "code": self.code() })),
        )
            .into_response()
    }
}

/// Type alias for fallible return values
///
/// Use this for all internal functions that can fail. Provides a consistent
/// error type throughout the codebase.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::AppError;

    #[test]
    fn maps_variants_to_statuses() {
        assert_eq!(AppError::invalid("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Send("x".to_owned()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Timeout("x".to_owned()).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn into_send_retags_mailbox_failures_only() {
        let err = AppError::Mailbox("boom".to_owned()).into_send();
        assert_eq!(err.code(), "send_failed");

        let err = AppError::Timeout("slow".to_owned()).into_send();
        assert_eq!(err.code(), "timeout");
    }
}
