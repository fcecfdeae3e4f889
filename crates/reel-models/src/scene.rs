//! Storyboard scenes.
//!
//! Untyped JSON is accepted at the LLM boundary only; everything past the
//! storyboard engine works with these validated records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hard cap on the summed scene durations.
pub const MAX_STORYBOARD_SECONDS: f64 = 45.0;

/// One ordered element of a storyboard, backing one generated still.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// Stable 0-based index within the storyboard
    pub index: u32,
    /// Human-readable description shown in the editor
    pub description: String,
    /// Provider-facing generation prompt
    pub image_prompt: String,
    /// How long the still is held on screen
    pub duration_seconds: f64,
    /// Set when generation fell back to the placeholder image
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder_used: bool,
    /// Failure kind that forced the fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Validation failures for provider-supplied storyboards.
#[derive(Debug, Error, PartialEq)]
pub enum SceneValidationError {
    #[error("storyboard has no scenes")]
    Empty,

    #[error("scene {0} has an empty description")]
    EmptyDescription(u32),

    #[error("scene {0} has an empty image prompt")]
    EmptyImagePrompt(u32),

    #[error("scene {0} has non-positive duration {1}")]
    NonPositiveDuration(u32, f64),
}

/// Ordered scene list. Versioning lives on the video record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Storyboard {
    pub scenes: Vec<Scene>,
}

impl Storyboard {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Summed scene durations in seconds.
    pub fn total_duration(&self) -> f64 {
        self.scenes.iter().map(|s| s.duration_seconds).sum()
    }

    /// Check the invariants every stored storyboard satisfies.
    pub fn validate(&self) -> Result<(), SceneValidationError> {
        if self.scenes.is_empty() {
            return Err(SceneValidationError::Empty);
        }
        for scene in &self.scenes {
            if scene.description.trim().is_empty() {
                return Err(SceneValidationError::EmptyDescription(scene.index));
            }
            if scene.image_prompt.trim().is_empty() {
                return Err(SceneValidationError::EmptyImagePrompt(scene.index));
            }
            if !(scene.duration_seconds > 0.0) {
                return Err(SceneValidationError::NonPositiveDuration(
                    scene.index,
                    scene.duration_seconds,
                ));
            }
        }
        Ok(())
    }

    /// Reindex scenes to match their position in the list.
    pub fn reindex(&mut self) {
        for (i, scene) in self.scenes.iter_mut().enumerate() {
            scene.index = i as u32;
        }
    }

    /// Scale durations proportionally so the total fits `max_total`.
    ///
    /// The provider contract caps a board at 45s; an over-long board is
    /// repaired here rather than rejected.
    pub fn clamp_total_duration(&mut self, max_total: f64) {
        let total = self.total_duration();
        if total > max_total && total > 0.0 {
            let scale = max_total / total;
            for scene in &mut self.scenes {
                scene.duration_seconds *= scale;
            }
        }
    }
}
