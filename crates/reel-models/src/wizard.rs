//! Wizard progress projection.
//!
//! The projection is a pure function of the persisted record; any transport
//! (polling, SSE, websockets) may render it. Percent is monotonic
//! non-decreasing within a stage because it is derived from the record's own
//! monotonic counters.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::status::VideoStatus;
use crate::video::VideoRecord;

/// User-facing pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WizardStage {
    Script,
    Storyboard,
    Assets,
    Render,
    Done,
}

impl WizardStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WizardStage::Script => "script",
            WizardStage::Storyboard => "storyboard",
            WizardStage::Assets => "assets",
            WizardStage::Render => "render",
            WizardStage::Done => "done",
        }
    }
}

/// Action the UI may offer in the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    EditScript,
    ApproveScript,
    RetryScript,
    GenerateStoryboard,
    RetryStoryboard,
    EditScenePrompt,
    GenerateAssets,
    RetryAssets,
    StartRender,
    RetryRender,
    CancelRender,
    Download,
}

/// Snapshot handed to the wait/progress UI.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WizardView {
    pub stage: WizardStage,
    pub status: VideoStatus,
    pub percent: u8,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub next_actions: Vec<NextAction>,
}

/// Project a record into its wizard view.
pub fn project_progress(record: &VideoRecord) -> WizardView {
    use NextAction::*;
    use VideoStatus::*;

    let (stage, percent, detail, next_actions): (WizardStage, u8, String, Vec<NextAction>) =
        match record.status {
            Created => (
                WizardStage::Script,
                0,
                "Waiting for script generation".into(),
                vec![],
            ),
            ScriptGenerating => (WizardStage::Script, 50, "Writing the script".into(), vec![]),
            ScriptGenerated => (
                WizardStage::Script,
                100,
                "Script ready for review".into(),
                vec![EditScript, ApproveScript, GenerateStoryboard],
            ),
            ScriptFailed => (
                WizardStage::Script,
                0,
                "Script generation failed".into(),
                vec![RetryScript, EditScript],
            ),
            ScriptApproved => (
                WizardStage::Storyboard,
                0,
                "Script approved".into(),
                vec![GenerateStoryboard],
            ),
            StoryboardGenerating => (
                WizardStage::Storyboard,
                50,
                "Sketching scenes".into(),
                vec![],
            ),
            StoryboardGenerated => (
                WizardStage::Storyboard,
                100,
                format!("{} scenes ready for review", record.scene_count()),
                vec![EditScenePrompt, GenerateAssets],
            ),
            StoryboardFailed => (
                WizardStage::Storyboard,
                0,
                "Storyboard generation failed".into(),
                vec![RetryStoryboard],
            ),
            AssetsGenerating => (
                WizardStage::Assets,
                record.image_upload_progress.min(100),
                format!(
                    "Generating scene images ({}/{})",
                    record.images_ready(),
                    record.scene_count()
                ),
                vec![],
            ),
            AssetsPartial => (
                WizardStage::Assets,
                90,
                "Images ready; audio or captions still missing".into(),
                vec![RetryAssets],
            ),
            AssetsFailed => (
                WizardStage::Assets,
                0,
                "Asset generation failed".into(),
                vec![RetryAssets, EditScenePrompt],
            ),
            AssetsGenerated => (
                WizardStage::Assets,
                100,
                "All assets ready".into(),
                vec![EditScenePrompt, StartRender],
            ),
            Rendering => (
                WizardStage::Render,
                record.render_progress.min(100),
                "Rendering the final video".into(),
                vec![CancelRender],
            ),
            RenderFailed => (
                WizardStage::Render,
                0,
                "Render failed".into(),
                vec![RetryRender],
            ),
            Completed => (
                WizardStage::Done,
                100,
                "Your video is ready".into(),
                vec![Download],
            ),
        };

    WizardView {
        stage,
        status: record.status,
        percent,
        detail,
        error_message: record.error_message.clone(),
        next_actions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Scene, Storyboard};

    fn record_with_status(status: VideoStatus) -> VideoRecord {
        let mut record = VideoRecord::new("premise");
        record.status = status;
        record
    }

    #[test]
    fn test_completed_projection() {
        let mut record = record_with_status(VideoStatus::Completed);
        record.render_progress = 100;
        let view = project_progress(&record);
        assert_eq!(view.stage, WizardStage::Done);
        assert_eq!(view.percent, 100);
        assert!(view.next_actions.contains(&NextAction::Download));
    }

    #[test]
    fn test_assets_percent_tracks_upload_progress() {
        let mut record = record_with_status(VideoStatus::AssetsGenerating);
        record.storyboard_json = Some(Storyboard::new(vec![Scene {
            index: 0,
            description: "d".into(),
            image_prompt: "p".into(),
            duration_seconds: 4.0,
            placeholder_used: false,
            reason: None,
        }]));
        record.image_upload_progress = 33;
        let view = project_progress(&record);
        assert_eq!(view.stage, WizardStage::Assets);
        assert_eq!(view.percent, 33);
    }

    #[test]
    fn test_failed_states_offer_retry() {
        let view = project_progress(&record_with_status(VideoStatus::AssetsFailed));
        assert!(view.next_actions.contains(&NextAction::RetryAssets));
        assert_eq!(view.percent, 0);

        let view = project_progress(&record_with_status(VideoStatus::RenderFailed));
        assert!(view.next_actions.contains(&NextAction::RetryRender));
    }

    #[test]
    fn test_error_banner_carried_through() {
        let mut record = record_with_status(VideoStatus::AssetsGenerated);
        record.error_message = Some("Scene 3 used a placeholder image".into());
        let view = project_progress(&record);
        assert_eq!(
            view.error_message.as_deref(),
            Some("Scene 3 used a placeholder image")
        );
    }
}
