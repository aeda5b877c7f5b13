//! Error types for the console clients.

use thiserror::Error;

/// Unified failure type for every client operation.
///
/// Callers never see a raw transport error: HTTP failures, non-2xx
/// responses, and GraphQL-level errors all normalize into one of these
/// variants with a human-readable message.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401/403 response — the caller should re-authenticate.
    #[error("authentication failed: {message}")]
    Auth { status: u16, message: String },

    /// 404 response.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Any other non-2xx response, or a GraphQL error payload
    /// (`status` is `None` when the failure rode in a 2xx envelope).
    #[error("request failed: {message}")]
    Request { status: Option<u16>, message: String },

    /// Network, TLS, or response-decoding failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Invalid construction or call parameters.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Classify a non-2xx response by status, keeping the backend-provided
    /// message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => ApiError::Auth { status, message },
            404 => ApiError::NotFound { message },
            _ => ApiError::Request {
                status: Some(status),
                message,
            },
        }
    }

    /// Originating HTTP status, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status, .. } => Some(*status),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Request { status, .. } => *status,
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            ApiError::Config(_) => None,
        }
    }

    /// Human-readable message for display.
    pub fn message(&self) -> String {
        match self {
            ApiError::Auth { message, .. } => message.clone(),
            ApiError::NotFound { message } => message.clone(),
            ApiError::Request { message, .. } => message.clone(),
            ApiError::Transport(e) => e.to_string(),
            ApiError::Config(message) => message.clone(),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ApiError>;

// ======================================================================
// Tests
// ======================================================================
