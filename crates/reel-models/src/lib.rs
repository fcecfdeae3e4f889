//! Shared data models for the StoryReel pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - The video record (the job) and its whole-record patch form
//! - The status domain and allowed transitions
//! - Storyboard scenes and validation
//! - Script sections (hook/body/cta) with parsing and narration projection
//! - The stable error-kind taxonomy
//! - The wizard progress projection consumed by pollers

pub mod error_kind;
pub mod scene;
pub mod script;
pub mod status;
pub mod video;
pub mod wizard;

// Re-export common types
pub use error_kind::ErrorKind;
pub use scene::{Scene, SceneValidationError, Storyboard, MAX_STORYBOARD_SECONDS};
pub use script::{ScriptSections, SECTION_CHAR_LIMIT};
pub use status::VideoStatus;
pub use video::{image_progress_percent, VideoId, VideoPatch, VideoRecord};
pub use wizard::{project_progress, NextAction, WizardStage, WizardView};
