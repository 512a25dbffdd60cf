//! Error types for the remote sync client.

use thiserror::Error;

use fieldmark_core::sync::{RemoteError, RetryClass};

/// Result type alias for remote API operations.
pub type Result<T> = std::result::Result<T, RemoteApiError>;

/// Errors raised while talking to the verification backend.
#[derive(Debug, Error)]
pub enum RemoteApiError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API error response from the backend
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid request (missing required data, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RemoteApiError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Classify the failure for the engine's retry policy.
    ///
    /// Everything that cannot be attributed to the request itself is
    /// transient: the item stays queued and gets another attempt.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                408 | 423 | 425 | 429 => RetryClass::Transient,
                500..=599 => RetryClass::Transient,
                400..=499 => RetryClass::Permanent,
                _ => RetryClass::Transient,
            },
            Self::Http(_) => RetryClass::Transient,
            Self::Json(_) => RetryClass::Permanent,
            Self::InvalidRequest(_) => RetryClass::Permanent,
        }
    }
}

impl From<RemoteApiError> for RemoteError {
    fn from(err: RemoteApiError) -> Self {
        RemoteError {
            class: err.retry_class(),
            message: err.to_string(),
        }
    }
}
