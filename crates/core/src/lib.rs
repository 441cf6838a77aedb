//! Domain types and local media plumbing for scenechain runs.
//!
//! Everything here is free of network access: the per-run
//! [`RunContext`](run_context::RunContext), workspace naming, and the
//! ffmpeg/ffprobe wrappers used for continuity frames and assembly.

pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod media;
pub mod naming;
pub mod run_context;
pub mod subprocess;
pub mod types;
pub mod workspace;
