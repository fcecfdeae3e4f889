//! Pipeline error types.
//!
//! Engines catch errors at their boundary, classify them into the stable
//! error-kind taxonomy, and persist a stage-failure message. Errors never
//! cross stages in memory; downstream engines read status and
//! `error_message` from the record.

use reel_models::{ErrorKind, VideoStatus};
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cannot {action} while status is {status}")]
    InvalidStatus {
        status: VideoStatus,
        action: &'static str,
    },

    #[error("Input text is empty")]
    EmptyInput,

    #[error("Scene index {0} is out of range")]
    InvalidScene(u32),

    #[error("Missing required asset: {0}")]
    MissingAsset(&'static str),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Cancelled by user")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Provider error: {0}")]
    Provider(#[from] reel_providers::ProviderError),

    #[error("Storage error: {0}")]
    Storage(#[from] reel_storage::StorageError),

    #[error("State store error: {0}")]
    State(#[from] reel_state::StateError),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn invalid_status(status: VideoStatus, action: &'static str) -> Self {
        Self::InvalidStatus { status, action }
    }

    /// Map to the stable error-kind taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidStatus { .. } => ErrorKind::InvalidStatus,
            PipelineError::EmptyInput => ErrorKind::BadOutput,
            PipelineError::InvalidScene(_) => ErrorKind::NotFound,
            PipelineError::MissingAsset(_) => ErrorKind::InvalidStatus,
            PipelineError::Timeout(_) => ErrorKind::Timeout,
            PipelineError::Cancelled => ErrorKind::Cancelled,
            PipelineError::Internal(_) => ErrorKind::TranscoderFailed,
            PipelineError::Provider(e) => e.kind(),
            PipelineError::Storage(e) => e.kind(),
            PipelineError::State(e) => e.kind(),
            PipelineError::Media(e) => e.kind(),
            PipelineError::Io(_) => ErrorKind::ProviderTransient,
        }
    }

    /// Check if the kernel may retry this error.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Check for a content-policy rejection anywhere in the chain.
    pub fn is_content_policy(&self) -> bool {
        matches!(self.kind(), ErrorKind::ContentPolicy)
    }

    /// The message persisted to `error_message` on stage failure.
    ///
    /// A few messages are exact contract strings the UI matches on; the
    /// rest lead with the stable kind identifier.
    pub fn stage_message(&self) -> String {
        match self {
            PipelineError::EmptyInput => "empty_input".to_string(),
            PipelineError::Cancelled => "cancelled_by_user".to_string(),
            other => format!("{}: {}", other.kind(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_messages_are_exact() {
        assert_eq!(PipelineError::EmptyInput.stage_message(), "empty_input");
        assert_eq!(PipelineError::Cancelled.stage_message(), "cancelled_by_user");
    }

    #[test]
    fn test_stage_message_leads_with_kind() {
        let err = PipelineError::invalid_status(VideoStatus::Rendering, "generate assets");
        assert!(err.stage_message().starts_with("invalid_status:"));

        let err = PipelineError::Timeout(60);
        assert!(err.stage_message().starts_with("timeout:"));
    }

    #[test]
    fn test_provider_kinds_pass_through() {
        let err: PipelineError =
            reel_providers::ProviderError::ContentPolicy("blocked".into()).into();
        assert_eq!(err.kind(), ErrorKind::ContentPolicy);
        assert!(err.is_content_policy());
        assert!(!err.is_retryable());
    }
}
