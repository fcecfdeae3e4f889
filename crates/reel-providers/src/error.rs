//! Provider error types and classification.

use reel_models::ErrorKind;
use reqwest::StatusCode;
use thiserror::Error;

use crate::safety::is_content_policy_violation;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors surfaced by provider adapters.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider call timed out after {0} seconds")]
    Timeout(u64),

    #[error("Transient provider error: {0}")]
    Transient(String),

    #[error("Provider rejected credentials: {0}")]
    Auth(String),

    #[error("Provider quota exhausted: {0}")]
    Quota(String),

    #[error("Prompt blocked by content policy: {0}")]
    ContentPolicy(String),

    #[error("Provider returned unusable output: {0}")]
    BadOutput(String),

    #[error("Provider client misconfigured: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ProviderError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn bad_output(msg: impl Into<String>) -> Self {
        Self::BadOutput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Map to the stable error-kind taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Timeout(_) => ErrorKind::Timeout,
            ProviderError::Transient(_) => ErrorKind::ProviderTransient,
            ProviderError::Auth(_) | ProviderError::Config(_) => ErrorKind::ProviderAuth,
            ProviderError::Quota(_) => ErrorKind::ProviderQuota,
            ProviderError::ContentPolicy(_) => ErrorKind::ContentPolicy,
            ProviderError::BadOutput(_) => ErrorKind::BadOutput,
            ProviderError::Network(e) if e.is_timeout() => ErrorKind::Timeout,
            ProviderError::Network(_) => ErrorKind::ProviderTransient,
        }
    }

    /// Check if error is retryable (quota counts, with the kernel capping
    /// it at one retry).
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Check if error is a content-policy rejection.
    pub fn is_content_policy(&self) -> bool {
        matches!(self, ProviderError::ContentPolicy(_))
    }

    /// Classify a non-success HTTP response into a provider error.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let summary = summarize(body);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth(summary),
            StatusCode::PAYMENT_REQUIRED => ProviderError::Quota(summary),
            StatusCode::TOO_MANY_REQUESTS => {
                let lower = body.to_lowercase();
                if lower.contains("quota") || lower.contains("billing") {
                    ProviderError::Quota(summary)
                } else {
                    ProviderError::Transient(summary)
                }
            }
            s if s.is_server_error() => ProviderError::Transient(summary),
            s if s.is_client_error() => {
                if is_content_policy_violation(body) {
                    ProviderError::ContentPolicy(summary)
                } else {
                    ProviderError::BadOutput(format!("{}: {}", s, summary))
                }
            }
            s => ProviderError::Transient(format!("{}: {}", s, summary)),
        }
    }
}

/// Keep error bodies loggable without dumping whole payloads.
fn summarize(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ProviderError::from_response(StatusCode::UNAUTHORIZED, "bad key"),
            ProviderError::Auth(_)
        ));
        assert!(matches!(
            ProviderError::from_response(StatusCode::INTERNAL_SERVER_ERROR, "oops"),
            ProviderError::Transient(_)
        ));
        assert!(matches!(
            ProviderError::from_response(
                StatusCode::TOO_MANY_REQUESTS,
                "You exceeded your current quota"
            ),
            ProviderError::Quota(_)
        ));
        assert!(matches!(
            ProviderError::from_response(StatusCode::TOO_MANY_REQUESTS, "rate limit, slow down"),
            ProviderError::Transient(_)
        ));
    }

    #[test]
    fn test_policy_rejection_classification() {
        let err = ProviderError::from_response(
            StatusCode::BAD_REQUEST,
            "Your request was rejected by our safety system",
        );
        assert!(err.is_content_policy());
        assert_eq!(err.kind(), ErrorKind::ContentPolicy);
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(ProviderError::Timeout(60).kind(), ErrorKind::Timeout);
        assert_eq!(
            ProviderError::bad_output("junk").kind(),
            ErrorKind::BadOutput
        );
        assert!(!ProviderError::bad_output("junk").is_retryable());
        assert!(ProviderError::transient("blip").is_retryable());
    }
}
