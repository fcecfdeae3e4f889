//! Storage error types.

use reel_models::ErrorKind;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("Bucket create failed for {bucket}: {message}")]
    BucketCreateFailed { bucket: String, message: String },

    #[error("Upload failed for {key}: {message}")]
    UploadFailed { key: String, message: String },

    #[error("Object {key} not visible after {attempts} probes")]
    ObjectNotVisible { key: String, attempts: u32 },

    #[error("Download failed for {key}: {message}")]
    DownloadFailed { key: String, message: String },

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn upload_failed(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::UploadFailed {
            key: key.into(),
            message: msg.into(),
        }
    }

    pub fn download_failed(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::DownloadFailed {
            key: key.into(),
            message: msg.into(),
        }
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Map to the stable error-kind taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::UploadFailed { .. } | StorageError::BucketCreateFailed { .. } => {
                ErrorKind::UploadFailed
            }
            StorageError::ObjectNotVisible { .. } => ErrorKind::ObjectNotVisible,
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::ConfigError(_) => ErrorKind::ProviderAuth,
            StorageError::DownloadFailed { .. }
            | StorageError::Network(_)
            | StorageError::Io(_) => ErrorKind::ProviderTransient,
        }
    }
}
