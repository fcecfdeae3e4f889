//! Storyboard engine.
//!
//! Synthesizes the scene list from an approved or generated script,
//! versions every write, and tracks per-scene dirtiness for later
//! recompute. Asset generation is never triggered from here; the user
//! approves the board first.

use chrono::Utc;
use std::collections::BTreeSet;
use tracing::{info, warn};

use reel_models::{VideoId, VideoPatch, VideoRecord, VideoStatus, MAX_STORYBOARD_SECONDS};
use reel_providers::llm::LLM_TIMEOUT_SECS;

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::kernel::{with_retry, with_timeout};

pub struct StoryboardEngine<'a> {
    ctx: &'a PipelineContext,
}

impl<'a> StoryboardEngine<'a> {
    pub fn new(ctx: &'a PipelineContext) -> Self {
        Self { ctx }
    }

    /// Generate (or regenerate) the storyboard for a video.
    pub async fn generate(&self, id: &VideoId) -> PipelineResult<VideoRecord> {
        let record = self.ctx.videos.get(id).await?;
        if !record.status.can_generate_storyboard() {
            return Err(PipelineError::invalid_status(
                record.status,
                "generate storyboard",
            ));
        }
        let script_text = record
            .script_text
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or(PipelineError::MissingAsset("script"))?;

        let mut patch = VideoPatch::status(VideoStatus::StoryboardGenerating).clear_error();
        patch.storyboard_started_at = Some(Utc::now());
        self.ctx.videos.update(id, &patch).await?;

        match self.run_generation(id, &record, &script_text).await {
            Ok(record) => Ok(record),
            Err(e) => {
                self.fail_stage(id, &e).await;
                Err(e)
            }
        }
    }

    /// Flag one scene for image regeneration and empty its slot.
    /// No status change.
    pub async fn mark_scene_dirty(&self, id: &VideoId, index: u32) -> PipelineResult<VideoRecord> {
        let record = self.ctx.videos.get(id).await?;
        let scene_count = record.scene_count() as u32;
        if index >= scene_count {
            return Err(PipelineError::InvalidScene(index));
        }

        let mut dirty = record.dirty_scenes.clone();
        dirty.insert(index);

        let mut image_urls = record.image_urls.clone();
        if let Some(slot) = image_urls.get_mut(index as usize) {
            slot.clear();
        }

        let mut patch = VideoPatch::new();
        patch.dirty_scenes = Some(dirty);
        patch.image_urls = Some(image_urls);

        let record = self.ctx.videos.update(id, &patch).await?;
        info!(video_id = %id, scene = index, "scene marked dirty");
        Ok(record)
    }

    /// Rewrite one scene's image prompt: bumps the storyboard version,
    /// marks the scene dirty and empties its image slot.
    pub async fn update_scene_prompt(
        &self,
        id: &VideoId,
        index: u32,
        image_prompt: &str,
    ) -> PipelineResult<VideoRecord> {
        if image_prompt.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let record = self.ctx.videos.get(id).await?;
        if record.status.is_in_flight() {
            return Err(PipelineError::invalid_status(record.status, "edit scene"));
        }

        let mut board = record
            .storyboard_json
            .clone()
            .ok_or(PipelineError::MissingAsset("storyboard"))?;
        let scene = board
            .scenes
            .get_mut(index as usize)
            .ok_or(PipelineError::InvalidScene(index))?;
        scene.image_prompt = image_prompt.trim().to_string();
        scene.placeholder_used = false;
        scene.reason = None;

        let mut dirty = record.dirty_scenes.clone();
        dirty.insert(index);

        let mut image_urls = record.image_urls.clone();
        if let Some(slot) = image_urls.get_mut(index as usize) {
            slot.clear();
        }

        let mut patch = VideoPatch::new();
        patch.storyboard_json = Some(board);
        patch.storyboard_version = Some(record.storyboard_version + 1);
        patch.dirty_scenes = Some(dirty);
        patch.image_urls = Some(image_urls);

        let record = self.ctx.videos.update(id, &patch).await?;
        info!(video_id = %id, scene = index, "scene prompt updated");
        Ok(record)
    }

    async fn run_generation(
        &self,
        id: &VideoId,
        record: &VideoRecord,
        script_text: &str,
    ) -> PipelineResult<VideoRecord> {
        let policy = self.ctx.config.retry_policy();
        let llm = self.ctx.llm.clone();
        let script = script_text.to_string();

        let mut board = with_retry(&policy, "llm_storyboard", || {
            let llm = llm.clone();
            let script = script.clone();
            async move {
                with_timeout(
                    std::time::Duration::from_secs(LLM_TIMEOUT_SECS),
                    llm.storyboard(&script),
                )
                .await
            }
        })
        .await?;

        board
            .validate()
            .map_err(|e| reel_providers::ProviderError::bad_output(e.to_string()))?;
        board.reindex();
        board.clamp_total_duration(MAX_STORYBOARD_SECONDS);

        let scene_count = board.len();
        let mut patch = VideoPatch::status(VideoStatus::StoryboardGenerated);
        patch.storyboard_version = Some(record.storyboard_version + 1);
        patch.dirty_scenes = Some(BTreeSet::new());
        patch.image_urls = Some(vec![String::new(); scene_count]);
        patch.image_upload_progress = Some(0);
        patch.storyboard_done_at = Some(Utc::now());
        patch.storyboard_json = Some(board);
        if record.requires_regeneration {
            // The script changed since the old derivatives were made
            patch.requires_regeneration = Some(false);
            patch.audio_url = Some(None);
            patch.captions_url = Some(None);
            patch.final_video_url = Some(None);
        }

        let record = self.ctx.videos.update(id, &patch).await?;
        info!(video_id = %id, scenes = scene_count, version = record.storyboard_version, "storyboard generated");
        Ok(record)
    }

    async fn fail_stage(&self, id: &VideoId, error: &PipelineError) {
        warn!(video_id = %id, "storyboard generation failed: {}", error);
        let patch =
            VideoPatch::status(VideoStatus::StoryboardFailed).with_error(error.stage_message());
        if let Err(e) = self.ctx.videos.update(id, &patch).await {
            warn!(video_id = %id, "could not persist storyboard failure: {}", e);
        }
    }
}
