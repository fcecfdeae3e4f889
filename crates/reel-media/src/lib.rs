//! FFmpeg CLI wrapper for the StoryReel render path.
//!
//! This crate provides:
//! - Argument-vector command builder and runner (never shell strings)
//! - Duration probing via ffprobe
//! - Filter chains: 1080x1920 scale/pad, Ken Burns zoompan, subtitle burn
//! - Caption synthesis (SRT) and WebVTT conversion
//! - Scoped render workspaces with cleanup on every exit path

pub mod command;
pub mod error;
pub mod filters;
pub mod probe;
pub mod subtitles;
pub mod workspace;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use filters::{kenburns_filter, normalize_subtitle_path, subtitles_filter, FRAME_HEIGHT, FRAME_WIDTH};
pub use probe::probe_duration;
pub use subtitles::{build_captions, format_timestamp, is_webvtt, vtt_to_srt};
pub use workspace::RenderWorkspace;
