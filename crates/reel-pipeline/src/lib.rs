#![deny(unreachable_patterns)]
//! StoryReel job orchestrator.
//!
//! This crate provides:
//! - The retry/concurrency kernel every engine calls through
//! - Script, storyboard, asset and render engines
//! - The wizard controller for user-gated transitions and progress
//! - Configuration and startup environment validation

pub mod assets;
pub mod config;
pub mod context;
pub mod error;
pub mod kernel;
pub mod render;
pub mod script;
pub mod storyboard;
pub mod wizard;

pub use assets::AssetOrchestrator;
pub use config::{require_env, MissingEnv, PipelineConfig, REQUIRED_ENV};
pub use context::PipelineContext;
pub use error::{PipelineError, PipelineResult};
pub use kernel::{bounded_parallel, with_retry, with_timeout, RetryPolicy};
pub use render::{RenderEngine, RenderLocks, RenderOutcome};
pub use script::{ScriptEngine, ScriptUpdate};
pub use storyboard::StoryboardEngine;
pub use wizard::WizardController;
