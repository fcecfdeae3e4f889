//! Image generation client.
//!
//! One capability per call: `generate` against the primary model,
//! `fallback` against a lower-tier model that accepts looser prompts, and
//! `placeholder` which renders a known-safe still in-process and therefore
//! always succeeds.

use std::sync::OnceLock;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Default per-call timeout for image generation.
pub const IMAGE_TIMEOUT_SECS: u64 = 60;

/// Target frame geometry.
pub const FRAME_WIDTH: u32 = 1080;
pub const FRAME_HEIGHT: u32 = 1920;

/// Image client configuration.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Images API base URL
    pub api_base: String,
    /// Bearer credential
    pub api_key: String,
    /// Primary model
    pub model: String,
    /// Lower-tier fallback model
    pub fallback_model: String,
    /// Requested size (vertical, upscale-compatible with 1080x1920)
    pub size: String,
    /// Per-call timeout
    pub timeout: Duration,
}

impl ImageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            api_base: std::env::var("IMAGE_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("IMAGE_API_KEY")
                .map_err(|_| ProviderError::config("IMAGE_API_KEY not set"))?,
            model: std::env::var("IMAGE_MODEL").unwrap_or_else(|_| "dall-e-3".to_string()),
            fallback_model: std::env::var("IMAGE_FALLBACK_MODEL")
                .unwrap_or_else(|_| "dall-e-2".to_string()),
            size: std::env::var("IMAGE_SIZE").unwrap_or_else(|_| "1024x1792".to_string()),
            timeout: Duration::from_secs(IMAGE_TIMEOUT_SECS),
        })
    }
}

/// Images-generations client.
#[derive(Clone)]
pub struct ImageClient {
    config: ImageConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    model: String,
    prompt: String,
    n: u8,
    size: String,
    response_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

impl ImageClient {
    /// Create a new client.
    pub fn new(config: ImageConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Network)?;
        Ok(Self { config, client })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(ImageConfig::from_env()?)
    }

    /// Generate a vertical still with the primary model.
    pub async fn generate(&self, prompt: &str) -> ProviderResult<Vec<u8>> {
        self.generate_with(&self.config.model, prompt).await
    }

    /// Generate with the lower-tier fallback model.
    pub async fn fallback(&self, prompt: &str) -> ProviderResult<Vec<u8>> {
        self.generate_with(&self.config.fallback_model, prompt).await
    }

    /// Known-safe placeholder still. Never fails, never leaves the process.
    pub fn placeholder(&self) -> Vec<u8> {
        placeholder_jpeg().to_vec()
    }

    async fn generate_with(&self, model: &str, prompt: &str) -> ProviderResult<Vec<u8>> {
        let request = ImageRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            n: 1,
            size: self.config.size.clone(),
            response_format: "b64_json",
        };

        let url = format!("{}/images/generations", self.config.api_base);
        debug!(model = %model, "image generation request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_response(status, &body));
        }

        let parsed: ImageResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::bad_output(format!("invalid image payload: {}", e)))?;

        let b64 = parsed
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or_else(|| ProviderError::bad_output("image response has no data"))?;

        let bytes = BASE64
            .decode(b64.as_bytes())
            .map_err(|e| ProviderError::bad_output(format!("image is not valid base64: {}", e)))?;

        if bytes.is_empty() {
            return Err(ProviderError::bad_output("image decoded to zero bytes"));
        }
        Ok(bytes)
    }
}

/// Deterministic 1080x1920 gradient, rendered once per process.
fn placeholder_jpeg() -> &'static [u8] {
    static BYTES: OnceLock<Vec<u8>> = OnceLock::new();
    BYTES.get_or_init(|| {
        let mut raw = Vec::with_capacity((FRAME_WIDTH * FRAME_HEIGHT * 3) as usize);
        for y in 0..FRAME_HEIGHT {
            // Vertical slate gradient, dark at the top
            let t = y as f32 / FRAME_HEIGHT as f32;
            let r = (24.0 + 36.0 * t) as u8;
            let g = (28.0 + 44.0 * t) as u8;
            let b = (38.0 + 58.0 * t) as u8;
            for _ in 0..FRAME_WIDTH {
                raw.extend_from_slice(&[r, g, b]);
            }
        }

        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, 85);
        encoder
            .encode(&raw, FRAME_WIDTH, FRAME_HEIGHT, ColorType::Rgb8)
            .expect("placeholder encodes");
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ImageClient {
        ImageClient::new(ImageConfig {
            api_base: server.uri(),
            api_key: "test-key".into(),
            model: "primary".into(),
            fallback_model: "fallback".into(),
            size: "1024x1792".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_placeholder_always_succeeds() {
        let bytes = placeholder_jpeg();
        assert!(!bytes.is_empty());
        // JPEG magic bytes
        assert_eq!(bytes[..2], [0xFF, 0xD8]);
        // Deterministic
        assert_eq!(placeholder_jpeg(), bytes);
    }

    #[tokio::test]
    async fn test_generate_decodes_b64() {
        let server = MockServer::start().await;
        let payload = BASE64.encode(b"jpeg-bytes");
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"b64_json": payload}]
            })))
            .mount(&server)
            .await;

        let bytes = client_for(&server).generate("a cat").await.unwrap();
        assert_eq!(bytes, b"jpeg-bytes");
    }

    #[tokio::test]
    async fn test_policy_block_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                "Your request was rejected as a result of our safety system.",
            ))
            .mount(&server)
            .await;

        let err = client_for(&server).generate("something edgy").await.unwrap_err();
        assert!(err.is_content_policy());
    }
}
