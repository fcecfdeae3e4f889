//! State store error types.

use reel_models::ErrorKind;
use thiserror::Error;

/// Result type for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur against the state store.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Video not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StateError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Classify a non-success HTTP status.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => Self::AuthError(body.to_string()),
            404 => Self::NotFound(body.to_string()),
            429 => Self::RateLimited(body.to_string()),
            s if s >= 500 => Self::ServerError(s, body.to_string()),
            _ => Self::RequestFailed(format!("{}: {}", status, body)),
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StateError::Network(_) | StateError::RateLimited(_) | StateError::ServerError(_, _)
        )
    }

    /// Map to the stable error-kind taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StateError::NotFound(_) => ErrorKind::NotFound,
            StateError::AuthError(_) => ErrorKind::ProviderAuth,
            StateError::Json(_) | StateError::InvalidResponse(_) => ErrorKind::BadOutput,
            StateError::RateLimited(_)
            | StateError::ServerError(_, _)
            | StateError::RequestFailed(_)
            | StateError::Network(_) => ErrorKind::ProviderTransient,
        }
    }
}
