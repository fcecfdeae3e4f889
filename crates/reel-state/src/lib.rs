//! State store gateway.
//!
//! Typed reads and writes on the `videos` table over a PostgREST-style
//! endpoint:
//! - Whole-record patches; callers never read-modify-write
//! - One atomic update per call
//! - Best-effort `error_message` persistence when a write fails
//! - Exponential backoff on transient transport errors
//! - Observability (tracing spans, metrics)

pub mod client;
#[cfg(test)]
mod client_tests;
pub mod error;
pub mod metrics;
pub mod retry;

pub use client::{StateConfig, VideoStore};
pub use error::{StateError, StateResult};
pub use retry::RetryConfig;
