//! Asset orchestrator.
//!
//! Brings `image_urls`, `audio_url` and `captions_url` to a complete state
//! for rendering. Per-scene image tasks run under a concurrency ceiling;
//! a blocked or failing scene degrades to the placeholder image instead of
//! aborting the job. Record writes go through a single serialized
//! committer so snapshots of `image_urls` are always consistent.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use reel_models::{
    image_progress_percent, ErrorKind, ScriptSections, Storyboard, VideoId, VideoPatch,
    VideoRecord, VideoStatus,
};
use reel_providers::tts::TTS_TIMEOUT_SECS;
use reel_providers::{sanitize_prompt, soften_prompt, ImageClient};
use reel_storage::{
    audio_path, captions_path, scene_image_path, ObjectStore, BUCKET_AUDIO, BUCKET_CAPTIONS,
    BUCKET_IMAGES,
};
use reel_state::VideoStore;

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::kernel::{bounded_parallel, with_retry, with_timeout, RetryPolicy};

pub struct AssetOrchestrator<'a> {
    ctx: &'a PipelineContext,
}

/// How one scene's image was produced.
#[derive(Debug, Clone, Copy)]
struct SceneOutcome {
    placeholder_used: bool,
}

/// Audio/caption results; their failures degrade to `assets_partial`
/// rather than failing the stage.
struct AvOutcome {
    audio_url: Option<String>,
    captions_url: Option<String>,
    failure: Option<PipelineError>,
}

impl<'a> AssetOrchestrator<'a> {
    pub fn new(ctx: &'a PipelineContext) -> Self {
        Self { ctx }
    }

    /// Run the asset stage for a video.
    ///
    /// Idempotent: a record that is already `assets_generated` with no
    /// dirty scenes returns immediately without writes.
    pub async fn generate(&self, id: &VideoId) -> PipelineResult<VideoRecord> {
        let record = self.ctx.videos.get(id).await?;

        if record.status == VideoStatus::AssetsGenerated
            && record.dirty_scenes.is_empty()
            && record.assets_complete()
        {
            info!(video_id = %id, "assets already complete");
            return Ok(record);
        }
        if !(record.status.can_generate_assets() || record.status == VideoStatus::AssetsGenerated)
        {
            return Err(PipelineError::invalid_status(
                record.status,
                "generate assets",
            ));
        }

        let board = record
            .storyboard_json
            .clone()
            .ok_or(PipelineError::MissingAsset("storyboard"))?;

        // One slot per scene; dirty slots are emptied before refilling
        let mut image_urls = record.image_urls.clone();
        image_urls.resize(board.len(), String::new());
        for &dirty in &record.dirty_scenes {
            if let Some(slot) = image_urls.get_mut(dirty as usize) {
                slot.clear();
            }
        }

        let ready = image_urls.iter().filter(|u| !u.is_empty()).count();
        let mut patch = VideoPatch::status(VideoStatus::AssetsGenerating).clear_error();
        patch.assets_started_at = Some(Utc::now());
        patch.image_urls = Some(image_urls.clone());
        patch.image_upload_progress = Some(image_progress_percent(ready, image_urls.len()));
        let record = self.ctx.videos.update(id, &patch).await?;

        match self.run(id, &record, board, image_urls).await {
            Ok(record) => Ok(record),
            Err(e) => {
                self.fail_stage(id, &e).await;
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        id: &VideoId,
        record: &VideoRecord,
        board: Storyboard,
        image_urls: Vec<String>,
    ) -> PipelineResult<VideoRecord> {
        let pending: Vec<(usize, String)> = image_urls
            .iter()
            .enumerate()
            .filter(|(_, url)| url.is_empty())
            .map(|(i, _)| (i, board.scenes[i].image_prompt.clone()))
            .collect();
        info!(video_id = %id, scenes = board.len(), pending = pending.len(), "generating scene images");

        let committer = Arc::new(SceneCommitter {
            videos: self.ctx.videos.clone(),
            id: id.clone(),
            state: Mutex::new((image_urls, board)),
        });

        let tasks: Vec<_> = pending
            .into_iter()
            .map(|(index, prompt)| {
                let images = self.ctx.images.clone();
                let storage = self.ctx.storage.clone();
                let committer = Arc::clone(&committer);
                let id = id.clone();
                let policy = self.ctx.config.retry_policy();
                let timeout = self.ctx.config.image_timeout;
                let probes = self.ctx.config.availability_attempts;
                move || {
                    generate_scene_image(
                        images, storage, committer, id, index, prompt, policy, timeout, probes,
                    )
                }
            })
            .collect();

        let results = bounded_parallel(tasks, self.ctx.config.image_concurrency).await;
        if let Some(err) = results.into_iter().find_map(|r| r.err()) {
            // Only catastrophic failures surface here; provider trouble
            // already degraded the scene to a placeholder
            return Err(err);
        }

        let narration = record
            .script_text
            .as_deref()
            .map(|s| ScriptSections::parse(s).plain_narration())
            .unwrap_or_default();
        let av = self.ensure_audio_and_captions(id, record, &narration).await;
        if let Some(e) = &av.failure {
            warn!(video_id = %id, "audio/captions incomplete: {}", e);
        }

        let (final_urls, final_board) = committer.snapshot().await;
        self.finish(id, final_urls, final_board, av).await
    }

    /// Decide the terminal stage status and write the closing patch.
    async fn finish(
        &self,
        id: &VideoId,
        image_urls: Vec<String>,
        board: Storyboard,
        av: AvOutcome,
    ) -> PipelineResult<VideoRecord> {
        let total = image_urls.len();
        let all_filled = total > 0 && image_urls.iter().all(|u| !u.is_empty());
        let placeholder_scenes: Vec<u32> = board
            .scenes
            .iter()
            .filter(|s| s.placeholder_used)
            .map(|s| s.index + 1)
            .collect();
        let real_count = total - placeholder_scenes.len();
        let av_complete = av.audio_url.is_some() && av.captions_url.is_some();

        let (status, banner) = if !all_filled {
            (
                VideoStatus::AssetsFailed,
                Some("upload_failed: some scene images are missing".to_string()),
            )
        } else if real_count == 0 {
            (
                VideoStatus::AssetsFailed,
                Some(format!(
                    "content_policy: every scene was blocked. Edit the prompts for {} and retry.",
                    scene_list(&placeholder_scenes)
                )),
            )
        } else if av_complete {
            (
                VideoStatus::AssetsGenerated,
                if placeholder_scenes.is_empty() {
                    None
                } else {
                    Some(placeholder_notice(&placeholder_scenes))
                },
            )
        } else {
            let mut notes = Vec::new();
            if let Some(e) = &av.failure {
                notes.push(e.stage_message());
            }
            if !placeholder_scenes.is_empty() {
                notes.push(placeholder_notice(&placeholder_scenes));
            }
            (VideoStatus::AssetsPartial, Some(notes.join(" ")))
        };

        let ready = image_urls.iter().filter(|u| !u.is_empty()).count();
        let mut patch = VideoPatch::status(status);
        patch.image_urls = Some(image_urls);
        patch.image_upload_progress = Some(image_progress_percent(ready, total));
        patch.storyboard_json = Some(board);
        patch.dirty_scenes = Some(BTreeSet::new());
        patch.audio_url = av.audio_url.map(Some);
        patch.captions_url = av.captions_url.map(Some);
        if let Some(banner) = banner {
            patch.error_message = Some(Some(banner));
        }
        if status == VideoStatus::AssetsGenerated {
            patch.assets_done_at = Some(Utc::now());
        }

        let record = self.ctx.videos.update(id, &patch).await?;
        info!(video_id = %id, status = %record.status, "asset stage finished");
        Ok(record)
    }

    /// Synthesize narration and captions when missing. Failures here are
    /// reported, not thrown: the caller downgrades to `assets_partial`.
    async fn ensure_audio_and_captions(
        &self,
        id: &VideoId,
        record: &VideoRecord,
        narration: &str,
    ) -> AvOutcome {
        let mut audio_url = record.audio_url.clone();
        let mut fresh_audio: Option<Vec<u8>> = None;

        if audio_url.is_none() {
            match self.synthesize_audio(id, narration).await {
                Ok((url, bytes)) => {
                    audio_url = Some(url);
                    fresh_audio = Some(bytes);
                }
                Err(e) => {
                    return AvOutcome {
                        audio_url: None,
                        captions_url: record.captions_url.clone(),
                        failure: Some(e),
                    }
                }
            }
        }

        let mut captions_url = record.captions_url.clone();
        if captions_url.is_none() {
            match self.build_and_upload_captions(id, narration, fresh_audio).await {
                Ok(url) => captions_url = Some(url),
                Err(e) => {
                    return AvOutcome {
                        audio_url,
                        captions_url: None,
                        failure: Some(e),
                    }
                }
            }
        }

        AvOutcome {
            audio_url,
            captions_url,
            failure: None,
        }
    }

    async fn synthesize_audio(
        &self,
        id: &VideoId,
        narration: &str,
    ) -> PipelineResult<(String, Vec<u8>)> {
        if narration.trim().is_empty() {
            return Err(PipelineError::MissingAsset("narration"));
        }

        let policy = self.ctx.config.retry_policy();
        let tts = self.ctx.tts.clone();
        let narration = narration.to_string();
        let bytes = with_retry(&policy, "tts_synthesize", || {
            let tts = tts.clone();
            let narration = narration.clone();
            async move {
                with_timeout(
                    Duration::from_secs(TTS_TIMEOUT_SECS),
                    tts.synthesize(&narration),
                )
                .await
            }
        })
        .await?;

        let key = audio_path(id);
        self.ctx
            .storage
            .upload(BUCKET_AUDIO, &key, bytes.clone(), "audio/mpeg")
            .await?;
        self.ctx
            .storage
            .wait_for_availability(BUCKET_AUDIO, &key, self.ctx.config.availability_attempts)
            .await?;

        info!(video_id = %id, "narration audio uploaded");
        Ok((self.ctx.storage.public_url(BUCKET_AUDIO, &key), bytes))
    }

    async fn build_and_upload_captions(
        &self,
        id: &VideoId,
        narration: &str,
        fresh_audio: Option<Vec<u8>>,
    ) -> PipelineResult<String> {
        let audio_bytes = match fresh_audio {
            Some(bytes) => bytes,
            None => {
                self.ctx
                    .storage
                    .download_bytes(BUCKET_AUDIO, &audio_path(id))
                    .await?
            }
        };

        // Caption timing needs the real narration length
        let dir = tempfile::tempdir()?;
        let audio_file = dir.path().join("audio.mp3");
        tokio::fs::write(&audio_file, &audio_bytes).await?;
        let duration = reel_media::probe_duration(&audio_file).await?;

        let srt = reel_media::build_captions(narration, duration);
        if srt.is_empty() {
            return Err(
                reel_providers::ProviderError::bad_output("captions came out empty").into(),
            );
        }

        let key = captions_path(id);
        self.ctx
            .storage
            .upload(BUCKET_CAPTIONS, &key, srt.into_bytes(), "application/x-subrip")
            .await?;
        self.ctx
            .storage
            .wait_for_availability(BUCKET_CAPTIONS, &key, self.ctx.config.availability_attempts)
            .await?;

        info!(video_id = %id, "captions uploaded");
        Ok(self.ctx.storage.public_url(BUCKET_CAPTIONS, &key))
    }

    async fn fail_stage(&self, id: &VideoId, error: &PipelineError) {
        warn!(video_id = %id, "asset stage failed: {}", error);
        let patch =
            VideoPatch::status(VideoStatus::AssetsFailed).with_error(error.stage_message());
        if let Err(e) = self.ctx.videos.update(id, &patch).await {
            warn!(video_id = %id, "could not persist asset failure: {}", e);
        }
    }
}

/// Serialized writer for scene results.
///
/// The lock is held across the record write so URL/progress patches land
/// in commit order, and any read of `image_urls` sees a consistent
/// snapshot.
struct SceneCommitter {
    videos: VideoStore,
    id: VideoId,
    state: Mutex<(Vec<String>, Storyboard)>,
}

impl SceneCommitter {
    async fn commit(
        &self,
        index: usize,
        url: String,
        placeholder_used: bool,
        reason: Option<ErrorKind>,
    ) -> PipelineResult<()> {
        let mut state = self.state.lock().await;
        let (urls, board) = &mut *state;
        urls[index] = url;
        if let Some(scene) = board.scenes.get_mut(index) {
            scene.placeholder_used = placeholder_used;
            scene.reason = reason.map(|k| k.as_str().to_string());
        }

        let ready = urls.iter().filter(|u| !u.is_empty()).count();
        let mut patch = VideoPatch::new();
        patch.image_urls = Some(urls.clone());
        patch.image_upload_progress = Some(image_progress_percent(ready, urls.len()));
        patch.storyboard_json = Some(board.clone());
        self.videos.update(&self.id, &patch).await?;
        Ok(())
    }

    async fn snapshot(&self) -> (Vec<String>, Storyboard) {
        let state = self.state.lock().await;
        state.clone()
    }
}

/// One scene: produce bytes through the degradation chain, then upload.
#[allow(clippy::too_many_arguments)]
async fn generate_scene_image(
    images: ImageClient,
    storage: ObjectStore,
    committer: Arc<SceneCommitter>,
    id: VideoId,
    index: usize,
    image_prompt: String,
    policy: RetryPolicy,
    timeout: Duration,
    probes: u32,
) -> PipelineResult<SceneOutcome> {
    let (bytes, outcome, reason) =
        fetch_scene_bytes(&images, &image_prompt, &policy, timeout).await;

    let key = scene_image_path(&id, index);
    storage
        .upload(BUCKET_IMAGES, &key, bytes, "image/jpeg")
        .await?;
    storage.wait_for_availability(BUCKET_IMAGES, &key, probes).await?;
    let url = storage.public_url(BUCKET_IMAGES, &key);

    committer
        .commit(index, url, outcome.placeholder_used, reason)
        .await?;

    if outcome.placeholder_used {
        warn!(video_id = %id, scene = index, ?reason, "scene degraded to placeholder");
    }
    Ok(outcome)
}

/// Produce image bytes for a prompt, degrading through softening, the
/// fallback model, and finally the placeholder. Never fails.
async fn fetch_scene_bytes(
    images: &ImageClient,
    image_prompt: &str,
    policy: &RetryPolicy,
    timeout: Duration,
) -> (Vec<u8>, SceneOutcome, Option<ErrorKind>) {
    let sanitized = sanitize_prompt(image_prompt);

    let primary = with_retry(policy, "image_generate", || {
        let images = images.clone();
        let prompt = sanitized.clone();
        async move { with_timeout(timeout, images.generate(&prompt)).await }
    })
    .await;

    let primary_kind = match primary {
        Ok(bytes) => {
            return (
                bytes,
                SceneOutcome {
                    placeholder_used: false,
                },
                None,
            )
        }
        Err(e) => e.kind(),
    };

    // One softened retry against the primary model, only when the prompt
    // actually changed
    let mut final_prompt = sanitized.clone();
    if primary_kind == ErrorKind::ContentPolicy {
        let softened = soften_prompt(&sanitized);
        if softened != sanitized {
            if let Ok(bytes) = with_timeout(timeout, images.generate(&softened)).await {
                return (
                    bytes,
                    SceneOutcome {
                        placeholder_used: false,
                    },
                    None,
                );
            }
            final_prompt = softened;
        }
    }

    match with_timeout(timeout, images.fallback(&final_prompt)).await {
        Ok(bytes) => (
            bytes,
            SceneOutcome {
                placeholder_used: false,
            },
            None,
        ),
        Err(e) => (
            images.placeholder(),
            SceneOutcome {
                placeholder_used: true,
            },
            Some(e.kind()),
        ),
    }
}

fn scene_list(one_based: &[u32]) -> String {
    let list = one_based
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if one_based.len() == 1 {
        format!("scene {}", list)
    } else {
        format!("scenes {}", list)
    }
}

fn placeholder_notice(one_based: &[u32]) -> String {
    format!(
        "{} used a placeholder image. Edit the prompt and regenerate to replace it.",
        scene_list_capitalized(one_based)
    )
}

fn scene_list_capitalized(one_based: &[u32]) -> String {
    let list = scene_list(one_based);
    let mut chars = list.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => list,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_list_formatting() {
        assert_eq!(scene_list(&[3]), "scene 3");
        assert_eq!(scene_list(&[2, 5]), "scenes 2, 5");
        assert!(placeholder_notice(&[3]).starts_with("Scene 3 used a placeholder"));
    }

    #[test]
    fn test_placeholder_notice_names_indices() {
        let notice = placeholder_notice(&[1, 4]);
        assert!(notice.contains("1"));
        assert!(notice.contains("4"));
        assert!(notice.to_lowercase().contains("placeholder"));
    }
}
