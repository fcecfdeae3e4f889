//! Error types for media operations.

use std::path::PathBuf;

use reel_models::ErrorKind;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during transcoding and probing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("Transcode failed: {message}")]
    TranscodeFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Probe failed: {message}")]
    ProbeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Output is empty: {0}")]
    EmptyOutput(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create a transcode failure error.
    pub fn transcode_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::TranscodeFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a probe failure error.
    pub fn probe_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ProbeFailed {
            message: message.into(),
            stderr,
        }
    }

    /// Map to the stable error-kind taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::Timeout(_) => ErrorKind::Timeout,
            MediaError::Cancelled => ErrorKind::Cancelled,
            MediaError::FileNotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::TranscoderFailed,
        }
    }

    /// FFmpeg stderr tail for failure classification, when captured.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            MediaError::TranscodeFailed { stderr, .. } => stderr.as_deref(),
            MediaError::ProbeFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}
