//! Script engine.
//!
//! Drives a record from `created` through `script_generating` to
//! `script_generated` or `script_failed`, and handles user edits after
//! later stages exist.

use chrono::Utc;
use tracing::{info, warn};

use reel_models::{
    ScriptSections, VideoId, VideoPatch, VideoRecord, VideoStatus, SECTION_CHAR_LIMIT,
};
use reel_providers::llm::LLM_TIMEOUT_SECS;
use reel_providers::strip_meta;

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::kernel::{with_retry, with_timeout};

/// Result of a script edit.
#[derive(Debug, Clone)]
pub struct ScriptUpdate {
    pub record: VideoRecord,
    /// A storyboard existed when the script changed; forward progress must
    /// regenerate derivatives.
    pub requires_regeneration: bool,
}

pub struct ScriptEngine<'a> {
    ctx: &'a PipelineContext,
}

impl<'a> ScriptEngine<'a> {
    pub fn new(ctx: &'a PipelineContext) -> Self {
        Self { ctx }
    }

    /// Create a record for a premise and generate its script.
    pub async fn generate(&self, input_text: &str) -> PipelineResult<VideoRecord> {
        let record = self.ctx.videos.insert(&VideoRecord::new(input_text)).await?;
        let id = record.id.clone();
        info!(video_id = %id, "starting script generation");

        self.enter_stage(&id).await?;
        match self.run_generation(&id, input_text).await {
            Ok(record) => Ok(record),
            Err(e) => {
                self.fail_stage(&id, &e).await;
                Err(e)
            }
        }
    }

    /// Re-run generation for an existing record (explicit retry).
    pub async fn regenerate(&self, id: &VideoId) -> PipelineResult<VideoRecord> {
        let record = self.ctx.videos.get(id).await?;
        if !matches!(
            record.status,
            VideoStatus::Created | VideoStatus::ScriptFailed | VideoStatus::ScriptGenerated
        ) {
            return Err(PipelineError::invalid_status(
                record.status,
                "regenerate script",
            ));
        }

        self.enter_stage(id).await?;
        match self.run_generation(id, &record.input_text).await {
            Ok(record) => Ok(record),
            Err(e) => {
                self.fail_stage(id, &e).await;
                Err(e)
            }
        }
    }

    /// Persist a user-edited script.
    ///
    /// Derivatives are never discarded here; when a storyboard exists the
    /// record is flagged `requires_regeneration` and drops back to
    /// `script_generated`.
    pub async fn update(&self, id: &VideoId, script_text: &str) -> PipelineResult<ScriptUpdate> {
        if script_text.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let record = self.ctx.videos.get(id).await?;
        if record.status.is_in_flight() {
            return Err(PipelineError::invalid_status(record.status, "edit script"));
        }

        let sections = ScriptSections::parse(script_text).clamped(SECTION_CHAR_LIMIT);
        let canonical = sections.serialize();
        let requires_regeneration = record.storyboard_json.is_some();

        let mut patch = VideoPatch::status(VideoStatus::ScriptGenerated);
        patch.script_text = Some(canonical.clone());
        patch.script = Some(canonical);
        if requires_regeneration {
            patch.requires_regeneration = Some(true);
        }

        let record = self.ctx.videos.update(id, &patch).await?;
        info!(video_id = %id, requires_regeneration, "script updated");
        Ok(ScriptUpdate {
            record,
            requires_regeneration,
        })
    }

    async fn enter_stage(&self, id: &VideoId) -> PipelineResult<()> {
        let mut patch = VideoPatch::status(VideoStatus::ScriptGenerating).clear_error();
        patch.script_started_at = Some(Utc::now());
        self.ctx.videos.update(id, &patch).await?;
        Ok(())
    }

    async fn run_generation(&self, id: &VideoId, input_text: &str) -> PipelineResult<VideoRecord> {
        let premise = input_text.trim().to_string();
        if premise.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let policy = self.ctx.config.retry_policy();
        let llm = self.ctx.llm.clone();
        let raw = with_retry(&policy, "llm_script", || {
            let llm = llm.clone();
            let premise = premise.clone();
            async move {
                with_timeout(
                    std::time::Duration::from_secs(LLM_TIMEOUT_SECS),
                    llm.script(&premise),
                )
                .await
            }
        })
        .await?;

        let sections = ScriptSections::parse(&strip_meta(&raw));
        if !sections.is_complete() {
            return Err(
                reel_providers::ProviderError::bad_output("script is missing a labeled section")
                    .into(),
            );
        }
        let canonical = sections.clamped(SECTION_CHAR_LIMIT).serialize();

        let mut patch = VideoPatch::status(VideoStatus::ScriptGenerated);
        patch.script_text = Some(canonical.clone());
        patch.script = Some(canonical);
        patch.script_done_at = Some(Utc::now());

        let record = self.ctx.videos.update(id, &patch).await?;
        info!(video_id = %id, "script generated");
        Ok(record)
    }

    async fn fail_stage(&self, id: &VideoId, error: &PipelineError) {
        warn!(video_id = %id, "script generation failed: {}", error);
        let patch =
            VideoPatch::status(VideoStatus::ScriptFailed).with_error(error.stage_message());
        if let Err(e) = self.ctx.videos.update(id, &patch).await {
            warn!(video_id = %id, "could not persist script failure: {}", e);
        }
    }
}
