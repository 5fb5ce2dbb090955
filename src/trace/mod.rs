//! Shared trace data types and line patterns.
//!
//! - [`models`]: frames, stack traces and statistics produced by a run
//! - [`patterns`]: compiled regular expressions for trace line recognition

pub mod models;
pub mod patterns;

pub use models::*;
