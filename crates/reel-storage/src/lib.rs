//! Object store gateway.
//!
//! This crate provides:
//! - Bucket lifecycle (idempotent creation)
//! - Typed uploads with overwrite semantics and bounded retries
//! - Deterministic public URL resolution
//! - Post-upload availability probing (closes the upload/CDN race)
//! - Stable object path conventions

pub mod client;
pub mod error;
pub mod paths;

pub use client::{ObjectStore, StoreConfig};
pub use error::{StorageError, StorageResult};
pub use paths::{
    audio_path, captions_path, final_video_path, scene_image_path, ALL_BUCKETS, BUCKET_AUDIO,
    BUCKET_CAPTIONS, BUCKET_IMAGES, BUCKET_VIDEOS,
};
