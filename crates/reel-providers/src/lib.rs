//! Provider adapters for the StoryReel pipeline.
//!
//! This crate provides:
//! - LLM client for script and storyboard generation
//! - Image generation client (primary model, fallback model, placeholder)
//! - TTS client for narration synthesis
//! - Prompt hygiene: meta-text stripping, sanitization, softening
//!
//! Each adapter exposes one capability with a per-call timeout and a
//! classified error kind. Adapters never retry internally; retry policy
//! lives in the pipeline kernel.

pub mod error;
pub mod image;
pub mod llm;
pub mod safety;
pub mod tts;

pub use error::{ProviderError, ProviderResult};
pub use image::{ImageClient, ImageConfig};
pub use llm::{LlmClient, LlmConfig};
pub use safety::{is_content_policy_violation, sanitize_prompt, soften_prompt, strip_meta};
pub use tts::{TtsClient, TtsConfig};
