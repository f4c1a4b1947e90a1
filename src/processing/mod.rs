//! # Processing Engine
//!
//! Runs one filter job from a local source file to a published result. The
//! same engine backs the HTTP job workers and the one-shot `process` command.

pub mod engine;

pub use engine::{ProcessOutcome, ProcessPaths, ProcessingEngine, VideoProcessor};
