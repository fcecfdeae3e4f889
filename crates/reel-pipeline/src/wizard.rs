//! Wizard controller.
//!
//! Gates the user-facing transitions that are not owned by a generation
//! engine and serves the progress projection for pollers.

use tracing::info;

use reel_models::{project_progress, VideoId, VideoPatch, VideoRecord, VideoStatus, WizardView};

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};

pub struct WizardController<'a> {
    ctx: &'a PipelineContext,
}

impl<'a> WizardController<'a> {
    pub fn new(ctx: &'a PipelineContext) -> Self {
        Self { ctx }
    }

    /// Current `(stage, percent, details)` view for the progress UI.
    pub async fn view(&self, id: &VideoId) -> PipelineResult<WizardView> {
        let record = self.ctx.videos.get(id).await?;
        Ok(project_progress(&record))
    }

    /// User approves the generated script.
    pub async fn approve_script(&self, id: &VideoId) -> PipelineResult<VideoRecord> {
        let record = self.ctx.videos.get(id).await?;
        if !record.status.can_approve_script() {
            return Err(PipelineError::invalid_status(record.status, "approve script"));
        }

        let record = self
            .ctx
            .videos
            .update(id, &VideoPatch::status(VideoStatus::ScriptApproved))
            .await?;
        info!(video_id = %id, "script approved");
        Ok(record)
    }
}
