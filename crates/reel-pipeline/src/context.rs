//! Shared engine context.

use tracing::info;

use reel_providers::{ImageClient, LlmClient, TtsClient};
use reel_state::VideoStore;
use reel_storage::{ObjectStore, ALL_BUCKETS};

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::render::RenderLocks;

/// Everything an engine needs: gateways, provider clients, tunables, and
/// the per-process render lock map.
pub struct PipelineContext {
    pub videos: VideoStore,
    pub storage: ObjectStore,
    pub llm: LlmClient,
    pub images: ImageClient,
    pub tts: TtsClient,
    pub config: PipelineConfig,
    pub render_locks: RenderLocks,
}

impl PipelineContext {
    /// Wire up all clients from environment variables.
    pub fn from_env() -> PipelineResult<Self> {
        Ok(Self {
            videos: VideoStore::from_env()?,
            storage: ObjectStore::from_env()?,
            llm: LlmClient::from_env()?,
            images: ImageClient::from_env()?,
            tts: TtsClient::from_env()?,
            config: PipelineConfig::from_env(),
            render_locks: RenderLocks::default(),
        })
    }

    /// Provision every bucket the pipeline writes. Idempotent.
    pub async fn ensure_buckets(&self) -> PipelineResult<()> {
        for bucket in ALL_BUCKETS {
            self.storage.ensure_bucket(bucket).await?;
        }
        info!("object store buckets ready");
        Ok(())
    }
}
