//! Video status domain and allowed transitions.
//!
//! A job moves monotonically through these statuses; each transition is
//! effected by exactly one engine. The predicates here are the single
//! source of truth for stage preconditions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a video job.
///
/// `render_ready` survives in old rows as an alias of `assets_generated`;
/// it is accepted on reads but never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Record exists, nothing generated yet
    #[default]
    Created,
    /// Script engine is calling the LLM
    ScriptGenerating,
    /// Script ready for user review
    ScriptGenerated,
    /// Script generation failed
    ScriptFailed,
    /// User approved the script
    ScriptApproved,
    /// Storyboard engine is calling the LLM
    StoryboardGenerating,
    /// Storyboard ready for user review
    StoryboardGenerated,
    /// Storyboard generation failed
    StoryboardFailed,
    /// Asset orchestrator is producing images/audio/captions
    AssetsGenerating,
    /// Images complete but audio or captions missing
    AssetsPartial,
    /// Asset generation failed
    AssetsFailed,
    /// All assets present, ready to render
    #[serde(alias = "render_ready")]
    AssetsGenerated,
    /// Render engine is transcoding
    Rendering,
    /// Render failed (or was cancelled)
    RenderFailed,
    /// Final video uploaded
    Completed,
}

impl VideoStatus {
    /// Get the canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Created => "created",
            VideoStatus::ScriptGenerating => "script_generating",
            VideoStatus::ScriptGenerated => "script_generated",
            VideoStatus::ScriptFailed => "script_failed",
            VideoStatus::ScriptApproved => "script_approved",
            VideoStatus::StoryboardGenerating => "storyboard_generating",
            VideoStatus::StoryboardGenerated => "storyboard_generated",
            VideoStatus::StoryboardFailed => "storyboard_failed",
            VideoStatus::AssetsGenerating => "assets_generating",
            VideoStatus::AssetsPartial => "assets_partial",
            VideoStatus::AssetsFailed => "assets_failed",
            VideoStatus::AssetsGenerated => "assets_generated",
            VideoStatus::Rendering => "rendering",
            VideoStatus::RenderFailed => "render_failed",
            VideoStatus::Completed => "completed",
        }
    }

    /// Terminal success state.
    pub fn is_completed(&self) -> bool {
        matches!(self, VideoStatus::Completed)
    }

    /// Any terminal-for-stage failure state.
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            VideoStatus::ScriptFailed
                | VideoStatus::StoryboardFailed
                | VideoStatus::AssetsFailed
                | VideoStatus::RenderFailed
        )
    }

    /// An engine currently owns the record.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            VideoStatus::ScriptGenerating
                | VideoStatus::StoryboardGenerating
                | VideoStatus::AssetsGenerating
                | VideoStatus::Rendering
        )
    }

    /// The storyboard engine may start from this status.
    pub fn can_generate_storyboard(&self) -> bool {
        matches!(
            self,
            VideoStatus::ScriptGenerated
                | VideoStatus::ScriptApproved
                | VideoStatus::StoryboardFailed
        )
    }

    /// The asset orchestrator may start from this status.
    pub fn can_generate_assets(&self) -> bool {
        matches!(
            self,
            VideoStatus::ScriptApproved
                | VideoStatus::StoryboardGenerated
                | VideoStatus::AssetsFailed
                | VideoStatus::AssetsPartial
                | VideoStatus::AssetsGenerating
        )
    }

    /// The render engine may start from this status.
    pub fn can_render(&self) -> bool {
        matches!(self, VideoStatus::AssetsGenerated | VideoStatus::RenderFailed)
    }

    /// The user may approve the script in this status.
    pub fn can_approve_script(&self) -> bool {
        matches!(self, VideoStatus::ScriptGenerated)
    }

    /// For a `*_failed` status, the generating state an explicit retry
    /// re-enters.
    pub fn retry_reentry(&self) -> Option<VideoStatus> {
        match self {
            VideoStatus::ScriptFailed => Some(VideoStatus::ScriptGenerating),
            VideoStatus::StoryboardFailed => Some(VideoStatus::StoryboardGenerating),
            VideoStatus::AssetsFailed => Some(VideoStatus::AssetsGenerating),
            VideoStatus::RenderFailed => Some(VideoStatus::Rendering),
            _ => None,
        }
    }
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_ready_alias_accepted_on_read() {
        let status: VideoStatus = serde_json::from_str("\"render_ready\"").unwrap();
        assert_eq!(status, VideoStatus::AssetsGenerated);
        // Canonical form is written back
        assert_eq!(
            serde_json::to_string(&status).unwrap(),
            "\"assets_generated\""
        );
    }

    #[test]
    fn test_storyboard_preconditions() {
        assert!(VideoStatus::ScriptGenerated.can_generate_storyboard());
        assert!(VideoStatus::ScriptApproved.can_generate_storyboard());
        assert!(!VideoStatus::Created.can_generate_storyboard());
        assert!(!VideoStatus::AssetsGenerated.can_generate_storyboard());
    }

    #[test]
    fn test_asset_preconditions() {
        assert!(VideoStatus::StoryboardGenerated.can_generate_assets());
        assert!(VideoStatus::AssetsFailed.can_generate_assets());
        assert!(VideoStatus::AssetsPartial.can_generate_assets());
        assert!(VideoStatus::AssetsGenerating.can_generate_assets());
        assert!(!VideoStatus::Rendering.can_generate_assets());
        assert!(!VideoStatus::Completed.can_generate_assets());
    }

    #[test]
    fn test_retry_reentry() {
        assert_eq!(
            VideoStatus::AssetsFailed.retry_reentry(),
            Some(VideoStatus::AssetsGenerating)
        );
        assert_eq!(VideoStatus::Completed.retry_reentry(), None);
    }
}
