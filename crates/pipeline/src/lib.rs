//! Scene-by-scene generation with visual continuity, and final assembly.
//!
//! [`continuity::ContinuityPipeline`] turns one prompt into one clip,
//! feeding the last frame of the previous clip into the next job.
//! [`assembler::SequenceAssembler`] stitches the run's clips together.
//! [`tools::RunSession`] exposes both as named operations for an external
//! planner.

pub mod assembler;
pub mod config;
pub mod continuity;
pub mod error;
pub mod events;
pub mod script;
pub mod tools;
