//! PostgREST `videos` table client.

use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use reel_models::{VideoId, VideoPatch, VideoRecord};

use crate::error::{StateError, StateResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};

/// State store client configuration.
#[derive(Debug, Clone)]
pub struct StateConfig {
    /// Service base URL
    pub base_url: String,
    /// Service-role credential
    pub service_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Retry policy for transient transport errors
    pub retry: RetryConfig,
}

impl StateConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StateResult<Self> {
        Ok(Self {
            base_url: std::env::var("STATE_STORE_URL")
                .map_err(|_| StateError::auth_error("STATE_STORE_URL not set"))?
                .trim_end_matches('/')
                .to_string(),
            service_key: std::env::var("SERVICE_ROLE_KEY")
                .map_err(|_| StateError::auth_error("SERVICE_ROLE_KEY not set"))?,
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        })
    }
}

/// Typed gateway over the `videos` table.
///
/// Every write is a whole-record patch applied atomically by the store;
/// callers never read-modify-write.
#[derive(Clone)]
pub struct VideoStore {
    http: Client,
    config: StateConfig,
}

impl VideoStore {
    /// Create a new store from configuration.
    pub fn new(config: StateConfig) -> StateResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(StateError::Network)?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> StateResult<Self> {
        Self::new(StateConfig::from_env()?)
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/videos", self.config.base_url)
    }

    fn row_url(&self, id: &VideoId) -> String {
        format!("{}?id=eq.{}", self.table_url(), id)
    }

    /// Insert a new record and return the stored row.
    pub async fn insert(&self, record: &VideoRecord) -> StateResult<VideoRecord> {
        let stored = with_retry(&self.config.retry, "insert_video", || async {
            let started = Instant::now();
            let response = self
                .http
                .post(self.table_url())
                .bearer_auth(&self.config.service_key)
                .header("apikey", &self.config.service_key)
                .header("Prefer", "return=representation")
                .json(record)
                .send()
                .await?;
            self.parse_rows("insert_video", started, response).await
        })
        .await?;

        info!(video_id = %stored.id, "created video record");
        Ok(stored)
    }

    /// Read a record by id.
    pub async fn get(&self, id: &VideoId) -> StateResult<VideoRecord> {
        with_retry(&self.config.retry, "get_video", || async {
            let started = Instant::now();
            let response = self
                .http
                .get(format!("{}&select=*", self.row_url(id)))
                .bearer_auth(&self.config.service_key)
                .header("apikey", &self.config.service_key)
                .send()
                .await?;
            self.parse_rows("get_video", started, response).await
        })
        .await
        .map_err(|e| match e {
            StateError::NotFound(_) => StateError::not_found(id.to_string()),
            other => other,
        })
    }

    /// Apply one atomic patch and return the updated row.
    ///
    /// On failure, a best-effort follow-up write records the underlying
    /// error in `error_message` before the error is surfaced.
    pub async fn update(&self, id: &VideoId, patch: &VideoPatch) -> StateResult<VideoRecord> {
        let result = with_retry(&self.config.retry, "update_video", || async {
            let started = Instant::now();
            let response = self
                .http
                .patch(self.row_url(id))
                .bearer_auth(&self.config.service_key)
                .header("apikey", &self.config.service_key)
                .header("Prefer", "return=representation")
                .json(patch)
                .send()
                .await?;
            self.parse_rows("update_video", started, response).await
        })
        .await;

        match result {
            Ok(record) => {
                debug!(video_id = %id, "patched video record");
                Ok(record)
            }
            Err(e) => {
                self.try_record_error(id, &e).await;
                Err(match e {
                    StateError::NotFound(_) => StateError::not_found(id.to_string()),
                    other => other,
                })
            }
        }
    }

    /// Best-effort `error_message` write after a failed patch. Never fails.
    async fn try_record_error(&self, id: &VideoId, cause: &StateError) {
        let body = serde_json::json!({
            "error_message": format!("state write failed: {}", cause),
        });

        let result = self
            .http
            .patch(self.row_url(id))
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
            .json(&body)
            .send()
            .await;

        if let Err(e) = result {
            warn!(video_id = %id, "could not persist error message: {}", e);
        }
    }

    /// Parse a PostgREST row-array response; an empty array means the row
    /// does not exist.
    async fn parse_rows(
        &self,
        operation: &str,
        started: Instant,
        response: reqwest::Response,
    ) -> StateResult<VideoRecord> {
        let status = response.status();
        record_request(operation, status.as_u16(), started.elapsed().as_millis() as f64);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StateError::from_http_status(status.as_u16(), &body));
        }

        if status == StatusCode::NO_CONTENT {
            return Err(StateError::invalid_response(
                "store returned no representation",
            ));
        }

        let rows: Vec<VideoRecord> = response.json().await.map_err(|e| {
            StateError::invalid_response(format!("videos row did not deserialize: {}", e))
        })?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StateError::not_found("no matching row"))
    }
}
