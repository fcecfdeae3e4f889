//! TTS client for narration synthesis.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Default per-call timeout for TTS synthesis.
pub const TTS_TIMEOUT_SECS: u64 = 120;

/// TTS client configuration.
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// TTS API base URL
    pub api_base: String,
    /// Provider credential
    pub api_key: String,
    /// Opaque provider voice handle
    pub voice_id: String,
    /// Synthesis model
    pub model_id: String,
    /// Per-call timeout
    pub timeout: Duration,
}

impl TtsConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            api_base: std::env::var("TTS_API_BASE")
                .unwrap_or_else(|_| "https://api.elevenlabs.io".to_string()),
            api_key: std::env::var("TTS_API_KEY")
                .map_err(|_| ProviderError::config("TTS_API_KEY not set"))?,
            voice_id: std::env::var("TTS_VOICE_ID")
                .unwrap_or_else(|_| "21m00Tcm4TlvDq8ikWAM".to_string()),
            model_id: std::env::var("TTS_MODEL_ID")
                .unwrap_or_else(|_| "eleven_multilingual_v2".to_string()),
            timeout: Duration::from_secs(TTS_TIMEOUT_SECS),
        })
    }
}

/// Text-to-speech client returning MP3 narration.
#[derive(Clone)]
pub struct TtsClient {
    config: TtsConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct SynthesisRequest {
    text: String,
    model_id: String,
}

impl TtsClient {
    /// Create a new client.
    pub fn new(config: TtsConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Network)?;
        Ok(Self { config, client })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(TtsConfig::from_env()?)
    }

    /// Synthesize narration with the configured voice.
    pub async fn synthesize(&self, text: &str) -> ProviderResult<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(ProviderError::bad_output("narration text is empty"));
        }

        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.config.api_base, self.config.voice_id
        );
        debug!(voice_id = %self.config.voice_id, chars = text.len(), "TTS synthesis request");

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .json(&SynthesisRequest {
                text: text.to_string(),
                model_id: self.config.model_id.clone(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_response(status, &body));
        }

        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(ProviderError::bad_output("synthesis returned zero bytes"));
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TtsClient {
        TtsClient::new(TtsConfig {
            api_base: server.uri(),
            api_key: "test-key".into(),
            voice_id: "voice-1".into(),
            model_id: "model-1".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_synthesize_returns_audio_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-1"))
            .and(header("xi-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3-bytes".to_vec()))
            .mount(&server)
            .await;

        let bytes = client_for(&server).synthesize("Hello world.").await.unwrap();
        assert_eq!(bytes, b"mp3-bytes");
    }

    #[tokio::test]
    async fn test_quota_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-1"))
            .respond_with(
                ResponseTemplate::new(429).set_body_string("monthly character quota exceeded"),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).synthesize("Hello.").await.unwrap_err();
        assert!(matches!(err, ProviderError::Quota(_)));
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_network() {
        let server = MockServer::start().await;
        let err = client_for(&server).synthesize("   ").await.unwrap_err();
        assert!(matches!(err, ProviderError::BadOutput(_)));
    }
}
