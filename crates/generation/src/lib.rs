//! Client side of the remote video generation service.
//!
//! [`client::GenerationClient`] is the seam the pipeline depends on;
//! [`api::SoraApi`] implements it against an OpenAI-compatible video
//! endpoint. [`poll::await_completion`] turns submit/poll into one bounded,
//! cancellable wait.

pub mod api;
pub mod client;
pub mod error;
pub mod job;
pub mod poll;
