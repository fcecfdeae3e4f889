//! Storage REST client.
//!
//! The gateway shares the state store's base URL and service-role
//! credential. All buckets are public-readable; writes use overwrite
//! (upsert) semantics so re-running a stage never needs delete-first.

use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};

/// Number of upload attempts before giving up.
const UPLOAD_ATTEMPTS: u32 = 3;
/// Linear backoff unit between upload attempts.
const UPLOAD_BACKOFF: Duration = Duration::from_millis(500);
/// Base delay for availability probing.
const PROBE_BASE_DELAY: Duration = Duration::from_millis(200);
/// Probe delay cap.
const PROBE_MAX_DELAY: Duration = Duration::from_secs(2);

/// Configuration for the object store gateway.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Service base URL (shared with the state store)
    pub base_url: String,
    /// Service-role credential
    pub service_key: String,
    /// Base URL used for public object URLs (CDN); defaults to `base_url`
    pub public_base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let base_url = std::env::var("STATE_STORE_URL")
            .map_err(|_| StorageError::config_error("STATE_STORE_URL not set"))?;
        let public_base_url =
            std::env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| base_url.clone());
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: std::env::var("SERVICE_ROLE_KEY")
                .map_err(|_| StorageError::config_error("SERVICE_ROLE_KEY not set"))?,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
        })
    }
}

/// Object store gateway.
#[derive(Clone)]
pub struct ObjectStore {
    http: Client,
    config: StoreConfig,
}

impl ObjectStore {
    /// Create a new gateway from configuration.
    pub fn new(config: StoreConfig) -> StorageResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(StorageError::Network)?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::new(StoreConfig::from_env()?)
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base_url, bucket, key
        )
    }

    /// Deterministic public URL for an object.
    pub fn public_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.public_base_url, bucket, key
        )
    }

    /// Create a public bucket if absent. Idempotent.
    pub async fn ensure_bucket(&self, bucket: &str) -> StorageResult<()> {
        let url = format!("{}/storage/v1/bucket", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
            .json(&serde_json::json!({ "id": bucket, "name": bucket, "public": true }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(bucket, "created bucket");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let lower = body.to_lowercase();
        if status == StatusCode::CONFLICT
            || lower.contains("already exists")
            || lower.contains("duplicate")
        {
            debug!(bucket, "bucket already exists");
            return Ok(());
        }

        Err(StorageError::BucketCreateFailed {
            bucket: bucket.to_string(),
            message: format!("{}: {}", status, body),
        })
    }

    /// Upload bytes with overwrite semantics.
    ///
    /// Transient transport failures are retried up to three attempts with
    /// linear backoff (500ms, 1s); anything else fails immediately.
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()> {
        let url = self.object_url(bucket, key);
        debug!(bucket, key, size = bytes.len(), "uploading object");

        let mut last_error = String::new();
        for attempt in 1..=UPLOAD_ATTEMPTS {
            let result = self
                .http
                .post(&url)
                .bearer_auth(&self.config.service_key)
                .header("apikey", &self.config.service_key)
                .header("x-upsert", "true")
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(bytes.clone())
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    info!(bucket, key, "uploaded object");
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    if !status.is_server_error() {
                        // Client errors will not heal on retry
                        return Err(StorageError::upload_failed(
                            key,
                            format!("{}: {}", status, body),
                        ));
                    }
                    last_error = format!("{}: {}", status, body);
                }
                Err(e) => last_error = e.to_string(),
            }

            if attempt < UPLOAD_ATTEMPTS {
                let delay = UPLOAD_BACKOFF * attempt;
                warn!(bucket, key, attempt, ?delay, "upload failed, retrying: {}", last_error);
                tokio::time::sleep(delay).await;
            }
        }

        Err(StorageError::upload_failed(
            key,
            format!("exhausted {} attempts: {}", UPLOAD_ATTEMPTS, last_error),
        ))
    }

    /// Probe the public URL until the object is observable.
    ///
    /// Closes the race between upload acknowledgement and CDN visibility.
    pub async fn wait_for_availability(
        &self,
        bucket: &str,
        key: &str,
        max_attempts: u32,
    ) -> StorageResult<()> {
        let url = self.public_url(bucket, key);

        for attempt in 0..max_attempts {
            match self.http.head(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(bucket, key, attempt, "object visible");
                    return Ok(());
                }
                Ok(response) => {
                    debug!(bucket, key, status = %response.status(), "object not yet visible");
                }
                Err(e) => {
                    debug!(bucket, key, "availability probe error: {}", e);
                }
            }

            if attempt + 1 < max_attempts {
                let delay = PROBE_BASE_DELAY
                    .saturating_mul(2u32.saturating_pow(attempt))
                    .min(PROBE_MAX_DELAY);
                tokio::time::sleep(delay).await;
            }
        }

        Err(StorageError::ObjectNotVisible {
            key: format!("{}/{}", bucket, key),
            attempts: max_attempts,
        })
    }

    /// Download an object as bytes.
    pub async fn download_bytes(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        let url = self.object_url(bucket, key);
        debug!(bucket, key, "downloading object");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.bytes().await?.to_vec()),
            StatusCode::NOT_FOUND => Err(StorageError::not_found(format!("{}/{}", bucket, key))),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StorageError::download_failed(
                    key,
                    format!("{}: {}", status, body),
                ))
            }
        }
    }

    /// Download an object to a file, creating parent directories.
    pub async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        path: impl AsRef<Path>,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        let bytes = self.download_bytes(bucket, key).await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await?;

        debug!(bucket, key, path = %path.display(), "downloaded object to file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> ObjectStore {
        ObjectStore::new(StoreConfig {
            base_url: server.uri(),
            service_key: "service-key".into(),
            public_base_url: server.uri(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_public_url_is_deterministic() {
        let store = ObjectStore::new(StoreConfig {
            base_url: "https://api.example.com".into(),
            service_key: "k".into(),
            public_base_url: "https://cdn.example.com".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        assert_eq!(
            store.public_url("renders-images", "videos/v1/images/scene-1.jpg"),
            "https://cdn.example.com/storage/v1/object/public/renders-images/videos/v1/images/scene-1.jpg"
        );
    }

    #[tokio::test]
    async fn test_ensure_bucket_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(url_path("/storage/v1/bucket"))
            .respond_with(
                ResponseTemplate::new(409).set_body_string("Bucket already exists"),
            )
            .mount(&server)
            .await;

        store_for(&server).ensure_bucket("renders-images").await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_with_upsert_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(url_path("/storage/v1/object/renders-audio/videos/v1/audio.mp3"))
            .and(header("x-upsert", "true"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        store_for(&server)
            .upload("renders-audio", "videos/v1/audio.mp3", b"mp3".to_vec(), "audio/mpeg")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_client_error_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(url_path("/storage/v1/object/renders-audio/videos/v1/audio.mp3"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .expect(1)
            .mount(&server)
            .await;

        let err = store_for(&server)
            .upload("renders-audio", "videos/v1/audio.mp3", b"mp3".to_vec(), "audio/mpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed { .. }));
    }

    #[tokio::test]
    async fn test_availability_probe_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .wait_for_availability("renders-videos", "videos/v1/final.mp4", 2)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotVisible { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_download_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .download_bytes("renders-images", "videos/v1/images/scene-1.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
