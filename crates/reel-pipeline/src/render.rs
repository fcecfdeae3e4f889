//! Render engine.
//!
//! Downloads the job's assets into a scoped workspace, drives the
//! transcoder (subtitle burn with a subtitle-less retry), uploads the
//! final MP4 behind an availability probe, and finalizes the record.
//! Cancellation is detected by re-reading status between checkpoints; the
//! in-process lock map only prevents duplicate concurrent invocations,
//! the record remains the source of truth.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use reel_media::{
    filters::render_filter_chain, is_webvtt, vtt_to_srt, FfmpegCommand, FfmpegRunner,
    RenderWorkspace,
};
use reel_models::{VideoId, VideoPatch, VideoRecord, VideoStatus};
use reel_storage::{
    audio_path, captions_path, final_video_path, scene_image_path, BUCKET_AUDIO, BUCKET_CAPTIONS,
    BUCKET_IMAGES, BUCKET_VIDEOS,
};

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};

/// Degradation banner when subtitle burn had to be skipped.
const SUBTITLE_SKIP_NOTICE: &str =
    "Subtitle burn failed and was skipped; the video has no burned-in captions.";

/// What an advisory lock entry records.
#[derive(Debug, Clone)]
pub struct RenderLockEntry {
    pub started_at: DateTime<Utc>,
    pub status: &'static str,
}

/// In-process render lock map keyed by video id.
///
/// Advisory only; cleared on process restart. A stale entry never blocks
/// another process because the record write wins.
#[derive(Clone, Default)]
pub struct RenderLocks {
    inner: Arc<Mutex<HashMap<String, RenderLockEntry>>>,
}

impl RenderLocks {
    /// Take the lock for a video, or learn it is held.
    pub fn try_acquire(&self, id: &VideoId) -> Option<RenderLockGuard> {
        let mut map = self.inner.lock().expect("render lock map");
        if map.contains_key(id.as_str()) {
            return None;
        }
        map.insert(
            id.as_str().to_string(),
            RenderLockEntry {
                started_at: Utc::now(),
                status: "rendering",
            },
        );
        Some(RenderLockGuard {
            locks: self.clone(),
            id: id.as_str().to_string(),
        })
    }

    /// Whether a render is currently running in this process.
    pub fn is_held(&self, id: &VideoId) -> bool {
        self.inner
            .lock()
            .expect("render lock map")
            .contains_key(id.as_str())
    }
}

/// Releases the lock entry on drop, on every exit path.
pub struct RenderLockGuard {
    locks: RenderLocks,
    id: String,
}

impl Drop for RenderLockGuard {
    fn drop(&mut self) {
        self.locks
            .inner
            .lock()
            .expect("render lock map")
            .remove(&self.id);
    }
}

/// Result of a render request.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    /// A render finished and the record is `completed`.
    Completed { final_video_url: String },
    /// The job was already `completed`; the existing URL is returned
    /// without work.
    AlreadyCompleted { final_video_url: String },
    /// A render is in flight for this job.
    AlreadyRendering,
}

pub struct RenderEngine<'a> {
    ctx: &'a PipelineContext,
}

impl<'a> RenderEngine<'a> {
    pub fn new(ctx: &'a PipelineContext) -> Self {
        Self { ctx }
    }

    /// Render the final video. `force` re-renders a completed job.
    pub async fn render(&self, id: &VideoId, force: bool) -> PipelineResult<RenderOutcome> {
        let record = self.ctx.videos.get(id).await?;

        if record.status == VideoStatus::Completed && !force {
            let url = record
                .final_video_url
                .clone()
                .ok_or(PipelineError::MissingAsset("final video url"))?;
            return Ok(RenderOutcome::AlreadyCompleted {
                final_video_url: url,
            });
        }
        if record.status == VideoStatus::Rendering && !force {
            return Ok(RenderOutcome::AlreadyRendering);
        }
        if !(record.status.can_render()
            || (force && matches!(record.status, VideoStatus::Completed | VideoStatus::Rendering)))
        {
            return Err(PipelineError::invalid_status(record.status, "render"));
        }
        if !record.all_images_ready() {
            return Err(PipelineError::MissingAsset("scene images"));
        }
        if record.audio_url.is_none() {
            return Err(PipelineError::MissingAsset("audio"));
        }

        let Some(_guard) = self.ctx.render_locks.try_acquire(id) else {
            return Ok(RenderOutcome::AlreadyRendering);
        };

        let mut patch = VideoPatch::status(VideoStatus::Rendering).clear_error();
        patch.render_progress = Some(0);
        patch.render_started_at = Some(Utc::now());
        self.ctx.videos.update(id, &patch).await?;
        info!(video_id = %id, force, "render started");

        match self.run(id, &record).await {
            Ok((url, degraded)) => {
                let mut patch = VideoPatch::status(VideoStatus::Completed);
                patch.final_video_url = Some(Some(url.clone()));
                patch.render_progress = Some(100);
                patch.render_done_at = Some(Utc::now());
                patch.error_message = Some(degraded.then(|| SUBTITLE_SKIP_NOTICE.to_string()));
                self.ctx.videos.update(id, &patch).await?;
                info!(video_id = %id, degraded, "render completed");
                Ok(RenderOutcome::Completed {
                    final_video_url: url,
                })
            }
            Err(PipelineError::Cancelled) => {
                // The cancel operation already wrote the terminal record
                info!(video_id = %id, "render cancelled");
                Err(PipelineError::Cancelled)
            }
            Err(e) => {
                warn!(video_id = %id, "render failed: {}", e);
                let mut patch =
                    VideoPatch::status(VideoStatus::RenderFailed).with_error(e.stage_message());
                patch.render_progress = Some(0);
                if let Err(write_err) = self.ctx.videos.update(id, &patch).await {
                    warn!(video_id = %id, "could not persist render failure: {}", write_err);
                }
                Err(e)
            }
        }
    }

    /// Cancel a render. Only permitted while `rendering`.
    pub async fn cancel(&self, id: &VideoId) -> PipelineResult<VideoRecord> {
        let record = self.ctx.videos.get(id).await?;
        if record.status != VideoStatus::Rendering {
            return Err(PipelineError::invalid_status(record.status, "cancel render"));
        }

        let mut patch = VideoPatch::status(VideoStatus::RenderFailed)
            .with_error(PipelineError::Cancelled.stage_message());
        patch.render_progress = Some(0);
        let record = self.ctx.videos.update(id, &patch).await?;
        info!(video_id = %id, "render cancellation requested");
        Ok(record)
    }

    /// The workspace half of a render: download, transcode, upload.
    ///
    /// Returns the public URL and whether subtitle burn was skipped. The
    /// workspace is removed on every exit path when it drops.
    async fn run(&self, id: &VideoId, record: &VideoRecord) -> PipelineResult<(String, bool)> {
        let board = record
            .storyboard_json
            .clone()
            .ok_or(PipelineError::MissingAsset("storyboard"))?;

        let workspace = RenderWorkspace::new()?;
        self.checkpoint(id, 10).await?;

        let audio_file = workspace.audio_path();
        self.ctx
            .storage
            .download_file(BUCKET_AUDIO, &audio_path(id), &audio_file)
            .await?;
        workspace.validate_non_empty(&audio_file).await?;
        self.checkpoint(id, 20).await?;

        let mut manifest_entries = Vec::with_capacity(board.len());
        for (i, scene) in board.scenes.iter().enumerate() {
            let image_file = workspace.scene_image_path(i);
            self.ctx
                .storage
                .download_file(BUCKET_IMAGES, &scene_image_path(id, i), &image_file)
                .await?;
            workspace.validate_non_empty(&image_file).await?;
            manifest_entries.push((image_file, scene.duration_seconds));
        }
        self.checkpoint(id, 30).await?;

        let captions_file = if record.captions_url.is_some() {
            let raw = self
                .ctx
                .storage
                .download_bytes(BUCKET_CAPTIONS, &captions_path(id))
                .await?;
            let text = String::from_utf8_lossy(&raw).into_owned();
            let srt = if is_webvtt(&text) { vtt_to_srt(&text) } else { text };
            let target = workspace.captions_path();
            tokio::fs::write(&target, srt).await?;
            Some(target)
        } else {
            None
        };
        self.checkpoint(id, 40).await?;

        let manifest = workspace.write_concat_manifest(&manifest_entries).await?;
        self.checkpoint(id, 50).await?;

        let output = workspace.output_path();
        let runner = FfmpegRunner::new().with_timeout(self.ctx.config.render_timeout);

        let transcode = runner
            .run(&self.transcode_command(&manifest, &audio_file, &output, captions_file.as_deref()))
            .await;

        let degraded = match transcode {
            Ok(()) => false,
            Err(e) if captions_file.is_some() => {
                warn!(video_id = %id, "subtitle burn failed, retrying without captions: {}", e);
                runner
                    .run(&self.transcode_command(&manifest, &audio_file, &output, None))
                    .await?;
                true
            }
            Err(e) => return Err(e.into()),
        };
        self.checkpoint(id, 80).await?;

        workspace.validate_non_empty(&output).await?;
        self.checkpoint(id, 90).await?;

        let bytes = tokio::fs::read(&output).await?;
        let key = final_video_path(id);
        self.ctx
            .storage
            .upload(BUCKET_VIDEOS, &key, bytes, "video/mp4")
            .await?;
        self.ctx
            .storage
            .wait_for_availability(BUCKET_VIDEOS, &key, self.ctx.config.availability_attempts)
            .await?;

        Ok((self.ctx.storage.public_url(BUCKET_VIDEOS, &key), degraded))
    }

    fn transcode_command(
        &self,
        manifest: &std::path::Path,
        audio: &std::path::Path,
        output: &std::path::Path,
        captions: Option<&std::path::Path>,
    ) -> FfmpegCommand {
        FfmpegCommand::new(output)
            .concat_input(manifest)
            .input(audio)
            .video_filter(render_filter_chain(self.ctx.config.fps, captions))
            .video_codec("libx264")
            .pixel_format("yuv420p")
            .audio_codec("aac")
            .audio_bitrate("192k")
            .frame_rate(self.ctx.config.fps)
            .faststart()
            .shortest()
    }

    /// Advance progress, detecting cancellation between steps.
    ///
    /// A record that is no longer `rendering` means the user (or another
    /// process) took the job away; abort without overwriting their write.
    async fn checkpoint(&self, id: &VideoId, percent: u8) -> PipelineResult<()> {
        let current = self.ctx.videos.get(id).await?;
        if current.status != VideoStatus::Rendering {
            return Err(PipelineError::Cancelled);
        }

        let mut patch = VideoPatch::new();
        patch.render_progress = Some(percent);
        self.ctx.videos.update(id, &patch).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_acquire_release() {
        let locks = RenderLocks::default();
        let id = VideoId::from_string("v1");

        let guard = locks.try_acquire(&id).expect("first acquire");
        assert!(locks.is_held(&id));
        assert!(locks.try_acquire(&id).is_none());

        drop(guard);
        assert!(!locks.is_held(&id));
        assert!(locks.try_acquire(&id).is_some());
    }

    #[test]
    fn test_locks_are_per_id() {
        let locks = RenderLocks::default();
        let _a = locks.try_acquire(&VideoId::from_string("a")).unwrap();
        assert!(locks.try_acquire(&VideoId::from_string("b")).is_some());
    }
}
