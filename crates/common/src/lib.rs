//! Shared utilities used across all handoff crates.

pub mod error;
pub mod time;

pub use {error::FromMessage, time::now_ms};
