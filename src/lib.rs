//! # Backdrop-Compositor
//!
//! Apply a video filter to the background of every frame while the
//! foreground subject keeps its original pixels.
//!
//! For each frame a foreground mask is estimated (largest face plus a torso
//! region, refined by a seeded segmenter), the selected filter is applied to
//! the whole frame and the original pixels are put back wherever the mask
//! marks foreground. Masks are recomputed about twice per second of video.
//! The filtered video track is then remuxed with the source audio.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use backdrop_compositor::{
//!     config::Config,
//!     filters::FilterKind,
//!     processing::{ProcessPaths, ProcessingEngine, VideoProcessor},
//!     vision,
//! };
//!
//! # fn main() -> backdrop_compositor::Result<()> {
//! let config = Config::default();
//! let oracle = vision::create_oracle(&config.vision)?;
//! let engine = ProcessingEngine::new(config, oracle)?;
//!
//! let paths = ProcessPaths {
//!     source: PathBuf::from("clip.mp4"),
//!     intermediate: PathBuf::from("temp/temp_1a2b3c4d.mp4"),
//!     remux_scratch: PathBuf::from("temp/temp_5e6f7a8b.part"),
//!     output: PathBuf::from("clip_sepia.mp4"),
//!     thumbnail: None,
//! };
//! engine.process(FilterKind::Sepia, &paths)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`filters`] - the closed set of background filters
//! - [`vision`] - mask estimation over a swappable face/segmentation backend
//! - [`video`] - decode, composite, frame pipeline, remux, thumbnails
//! - [`processing`] - one job from source file to published result
//! - [`jobs`] - asynchronous job manager and job store
//! - [`server`] - HTTP surface
//! - [`config`] - Configuration management

pub mod config;
pub mod error;
pub mod filters;
pub mod jobs;
pub mod processing;
pub mod server;
pub mod video;
pub mod vision;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{CompositorError, Result},
    filters::FilterKind,
    jobs::JobManager,
    processing::ProcessingEngine,
};
