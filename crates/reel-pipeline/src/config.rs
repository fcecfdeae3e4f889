//! Pipeline configuration.

use std::time::Duration;

use thiserror::Error;

use crate::kernel::RetryPolicy;

/// Environment variables the pipeline refuses to start without.
pub const REQUIRED_ENV: [&str; 5] = [
    "STATE_STORE_URL",
    "SERVICE_ROLE_KEY",
    "LLM_API_KEY",
    "IMAGE_API_KEY",
    "TTS_API_KEY",
];

/// Startup failure naming every missing variable at once.
#[derive(Debug, Error)]
#[error("missing required environment variables: {}", missing.join(", "))]
pub struct MissingEnv {
    pub missing: Vec<String>,
}

/// Verify all required environment variables are present.
pub fn require_env() -> Result<(), MissingEnv> {
    let missing: Vec<String> = REQUIRED_ENV
        .iter()
        .filter(|name| std::env::var(name).map_or(true, |v| v.trim().is_empty()))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingEnv { missing })
    }
}

/// Pipeline tunables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Concurrent per-scene image tasks within one job
    pub image_concurrency: usize,
    /// Per-call image generation timeout
    pub image_timeout: Duration,
    /// Transcoder invocation timeout
    pub render_timeout: Duration,
    /// Provider retry attempts
    pub retry_attempts: u32,
    /// Base delay for provider retry backoff
    pub retry_base_delay: Duration,
    /// Availability probes after an upload
    pub availability_attempts: u32,
    /// Output frame rate
    pub fps: u32,
    /// Output frame width (fixed)
    pub frame_width: u32,
    /// Output frame height (fixed)
    pub frame_height: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image_concurrency: 3,
            image_timeout: Duration::from_millis(60_000),
            render_timeout: Duration::from_millis(600_000),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            availability_attempts: 8,
            fps: 30,
            frame_width: 1080,
            frame_height: 1920,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            image_concurrency: env_parse("PIPELINE_IMAGE_CONCURRENCY", defaults.image_concurrency),
            image_timeout: Duration::from_millis(env_parse(
                "PIPELINE_IMAGE_TIMEOUT_MS",
                defaults.image_timeout.as_millis() as u64,
            )),
            render_timeout: Duration::from_millis(env_parse(
                "PIPELINE_RENDER_TIMEOUT_MS",
                defaults.render_timeout.as_millis() as u64,
            )),
            retry_attempts: env_parse("PIPELINE_RETRY_ATTEMPTS", defaults.retry_attempts),
            retry_base_delay: Duration::from_millis(env_parse(
                "PIPELINE_RETRY_BASE_DELAY_MS",
                defaults.retry_base_delay.as_millis() as u64,
            )),
            availability_attempts: env_parse(
                "PIPELINE_AVAILABILITY_ATTEMPTS",
                defaults.availability_attempts,
            ),
            fps: env_parse("PIPELINE_FPS", defaults.fps),
            frame_width: defaults.frame_width,
            frame_height: defaults.frame_height,
        }
    }

    /// Retry policy for provider calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            base_delay: self.retry_base_delay,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_match_contract() {
        let config = PipelineConfig::default();
        assert_eq!(config.image_concurrency, 3);
        assert_eq!(config.image_timeout, Duration::from_secs(60));
        assert_eq!(config.render_timeout, Duration::from_secs(600));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_base_delay, Duration::from_millis(500));
        assert_eq!((config.frame_width, config.frame_height), (1080, 1920));
        assert_eq!(config.fps, 30);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("PIPELINE_IMAGE_CONCURRENCY", "5");
        std::env::set_var("PIPELINE_RETRY_ATTEMPTS", "2");
        let config = PipelineConfig::from_env();
        assert_eq!(config.image_concurrency, 5);
        assert_eq!(config.retry_attempts, 2);
        std::env::remove_var("PIPELINE_IMAGE_CONCURRENCY");
        std::env::remove_var("PIPELINE_RETRY_ATTEMPTS");
    }

    #[test]
    #[serial]
    fn test_require_env_lists_all_missing() {
        for name in REQUIRED_ENV {
            std::env::remove_var(name);
        }
        std::env::set_var("LLM_API_KEY", "key");

        let err = require_env().unwrap_err();
        assert!(!err.missing.contains(&"LLM_API_KEY".to_string()));
        assert!(err.missing.contains(&"STATE_STORE_URL".to_string()));
        assert!(err.missing.contains(&"TTS_API_KEY".to_string()));
        assert_eq!(err.missing.len(), 4);

        std::env::remove_var("LLM_API_KEY");
    }
}
