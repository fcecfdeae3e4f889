//! Stable error-kind identifiers.
//!
//! Every failure surfaced by the pipeline is classified into one of these
//! kinds. The string forms are stable: they appear in `error_message` and
//! drive retry policy, so they must not change between releases.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Classified failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A bounded operation exceeded its deadline.
    Timeout,
    /// 5xx or otherwise retriable provider error.
    ProviderTransient,
    /// Credential rejected; fatal for the job until config is fixed.
    ProviderAuth,
    /// Billing/quota hard limit; retriable once at most.
    ProviderQuota,
    /// Image prompt rejected by safety filters.
    ContentPolicy,
    /// Provider returned unparseable or schema-violating content.
    BadOutput,
    /// Object-store write exhausted retries.
    UploadFailed,
    /// Upload acknowledged but object not observable in time.
    ObjectNotVisible,
    /// External media tool non-zero exit or output validation failure.
    TranscoderFailed,
    /// Precondition violation on a stage transition.
    InvalidStatus,
    /// Record or referenced resource missing.
    NotFound,
    /// User-initiated cancellation.
    Cancelled,
}

impl ErrorKind {
    /// Get the stable string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::ProviderTransient => "provider_transient",
            ErrorKind::ProviderAuth => "provider_auth",
            ErrorKind::ProviderQuota => "provider_quota",
            ErrorKind::ContentPolicy => "content_policy",
            ErrorKind::BadOutput => "bad_output",
            ErrorKind::UploadFailed => "upload_failed",
            ErrorKind::ObjectNotVisible => "object_not_visible",
            ErrorKind::TranscoderFailed => "transcoder_failed",
            ErrorKind::InvalidStatus => "invalid_status",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// Whether the kernel may retry an operation failing with this kind.
    ///
    /// `provider_quota` is special-cased by the retry loop (one retry at
    /// most) and reports `true` here.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::ProviderTransient
                | ErrorKind::ProviderQuota
                | ErrorKind::UploadFailed
                | ErrorKind::ObjectNotVisible
        )
    }

    /// Whether this kind is a quota limit (retriable once, then fatal).
    pub fn is_quota(&self) -> bool {
        matches!(self, ErrorKind::ProviderQuota)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_identifiers() {
        assert_eq!(ErrorKind::ContentPolicy.as_str(), "content_policy");
        assert_eq!(ErrorKind::ObjectNotVisible.as_str(), "object_not_visible");
        assert_eq!(
            serde_json::to_string(&ErrorKind::ProviderQuota).unwrap(),
            "\"provider_quota\""
        );
    }

    #[test]
    fn test_retry_classification() {
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::ProviderTransient.is_retryable());
        assert!(!ErrorKind::ContentPolicy.is_retryable());
        assert!(!ErrorKind::BadOutput.is_retryable());
        assert!(!ErrorKind::ProviderAuth.is_retryable());
        assert!(ErrorKind::ProviderQuota.is_quota());
    }
}
