//! The video record: the unit of work the pipeline drives.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scene::Storyboard;
use crate::status::VideoStatus;

/// Unique identifier for a video job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A row in the `videos` table.
///
/// Media artifacts live in object storage; the record holds URLs only.
/// All cross-stage communication goes through this record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    /// Unique video ID
    pub id: VideoId,

    /// Free-text premise supplied by the user
    pub input_text: String,

    /// Current lifecycle status
    #[serde(default)]
    pub status: VideoStatus,

    /// Canonical labeled script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_text: Option<String>,

    /// Legacy alias of `script_text`, still read by old clients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    /// Ordered scene list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storyboard_json: Option<Storyboard>,

    /// Incremented on every storyboard write
    #[serde(default)]
    pub storyboard_version: u32,

    /// Scene indices whose image must be regenerated
    #[serde(default)]
    pub dirty_scenes: BTreeSet<u32>,

    /// One slot per scene; empty string while unready
    #[serde(default)]
    pub image_urls: Vec<String>,

    /// Percent of scene images uploaded, 0-100
    #[serde(default)]
    pub image_upload_progress: u8,

    /// Narration MP3 public URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    /// SRT captions public URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captions_url: Option<String>,

    /// Final MP4 public URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<String>,

    /// Last surfaced error, or a non-fatal banner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Render percent, 0-100
    #[serde(default)]
    pub render_progress: u8,

    /// Script was edited after later stages ran; forward progress must
    /// regenerate derivatives
    #[serde(default)]
    pub requires_regeneration: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_done_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storyboard_started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storyboard_done_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets_started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets_done_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_done_at: Option<DateTime<Utc>>,
}

impl VideoRecord {
    /// Create a fresh record for a user premise.
    pub fn new(input_text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: VideoId::new(),
            input_text: input_text.into(),
            status: VideoStatus::Created,
            script_text: None,
            script: None,
            storyboard_json: None,
            storyboard_version: 0,
            dirty_scenes: BTreeSet::new(),
            image_urls: Vec::new(),
            image_upload_progress: 0,
            audio_url: None,
            captions_url: None,
            final_video_url: None,
            error_message: None,
            render_progress: 0,
            requires_regeneration: false,
            created_at: now,
            updated_at: now,
            script_started_at: None,
            script_done_at: None,
            storyboard_started_at: None,
            storyboard_done_at: None,
            assets_started_at: None,
            assets_done_at: None,
            render_started_at: None,
            render_done_at: None,
        }
    }

    /// Number of storyboard scenes (0 when no storyboard).
    pub fn scene_count(&self) -> usize {
        self.storyboard_json.as_ref().map_or(0, |b| b.len())
    }

    /// Number of non-empty image slots.
    pub fn images_ready(&self) -> usize {
        self.image_urls.iter().filter(|u| !u.is_empty()).count()
    }

    /// All image slots filled (and at least one scene exists).
    pub fn all_images_ready(&self) -> bool {
        !self.image_urls.is_empty() && self.image_urls.iter().all(|u| !u.is_empty())
    }

    /// Audio, captions and every image present.
    pub fn assets_complete(&self) -> bool {
        self.all_images_ready() && self.audio_url.is_some() && self.captions_url.is_some()
    }
}

/// Percent of filled slots, floored, 0-100.
pub fn image_progress_percent(ready: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((ready * 100) / total).min(100) as u8
}

/// Whole-record patch applied atomically by the state store gateway.
///
/// `None` fields are omitted from the write. Nullable columns
/// (`error_message` and the asset URLs) use a double `Option` so
/// `Some(None)` clears them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VideoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VideoStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storyboard_json: Option<Storyboard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storyboard_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dirty_scenes: Option<BTreeSet<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_upload_progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captions_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_video_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_regeneration: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_done_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storyboard_started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storyboard_done_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_done_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_done_at: Option<DateTime<Utc>>,
}

impl VideoPatch {
    /// An empty patch that still bumps `updated_at`.
    pub fn new() -> Self {
        Self {
            updated_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Patch that only transitions status.
    pub fn status(status: VideoStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::new()
        }
    }

    /// Patch that clears the error banner.
    pub fn clear_error(mut self) -> Self {
        self.error_message = Some(None);
        self
    }

    /// Patch that sets the error banner.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(Some(message.into()));
        self
    }

    /// True when nothing besides `updated_at` would be written.
    pub fn is_noop(&self) -> bool {
        let serialized = serde_json::to_value(self).unwrap_or_default();
        serialized
            .as_object()
            .map_or(true, |m| m.keys().all(|k| k == "updated_at"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults() {
        let record = VideoRecord::new("A cat learns to surf.");
        assert_eq!(record.status, VideoStatus::Created);
        assert_eq!(record.scene_count(), 0);
        assert!(!record.all_images_ready());
        assert!(record.dirty_scenes.is_empty());
    }

    #[test]
    fn test_image_progress_percent() {
        assert_eq!(image_progress_percent(0, 0), 0);
        assert_eq!(image_progress_percent(0, 6), 0);
        assert_eq!(image_progress_percent(1, 6), 16);
        assert_eq!(image_progress_percent(3, 6), 50);
        assert_eq!(image_progress_percent(6, 6), 100);
    }

    #[test]
    fn test_patch_skips_unset_fields() {
        let patch = VideoPatch::status(VideoStatus::ScriptGenerating);
        let json = serde_json::to_value(&patch).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert!(keys.contains(&"status".to_string()));
        assert!(keys.contains(&"updated_at".to_string()));
        assert!(!keys.contains(&"script_text".to_string()));
    }

    #[test]
    fn test_patch_error_clear_writes_null() {
        let patch = VideoPatch::new().clear_error();
        let json = serde_json::to_value(&patch).unwrap();
        assert!(json.get("error_message").unwrap().is_null());
    }

    #[test]
    fn test_assets_complete() {
        let mut record = VideoRecord::new("premise");
        record.image_urls = vec!["https://a".into(), "https://b".into()];
        assert!(!record.assets_complete());
        record.audio_url = Some("https://audio".into());
        record.captions_url = Some("https://captions".into());
        assert!(record.assets_complete());
        record.image_urls[1] = String::new();
        assert!(!record.assets_complete());
    }
}
