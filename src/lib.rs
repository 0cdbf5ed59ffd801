//! Subtrans - Adaptive Batch Subtitle Translation
//!
//! Translates SRT subtitle files through a chat-completions translation
//! service in adaptively sized batches, recovering from short, malformed or
//! failed responses so that every cue ends up with some text.

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod subtitle;
pub mod translate;
pub mod workflow;
