//! # Job Management
//!
//! Jobs are submitted with a video source and a filter name, validated
//! synchronously, then run by a background worker while clients poll their
//! status. Records live in a [`JobStore`]; the source is brought in by a
//! [`VideoFetcher`]; the heavy lifting is a
//! [`VideoProcessor`](crate::processing::VideoProcessor).

pub mod fetch;
pub mod manager;
pub mod store;
pub mod types;
pub mod workspace;

pub use fetch::{FfmpegFetcher, VideoFetcher};
pub use manager::{JobManager, THUMB_ROUTE, VIDEO_ROUTE};
pub use store::{InMemoryJobStore, JobStore};
pub use types::{JobId, JobRecord, JobStatus, JobUpdate};
pub use workspace::Workspace;
