//! # Video Module
//!
//! Everything between a source file on disk and a published result:
//! probing, decoding to RGB frames, per-frame filter and composite, the
//! intermediate video-only stream, the final remux and a thumbnail.
//!
//! Decoding and encoding go through the ffmpeg/ffprobe command line tools
//! over pipes, so no native ffmpeg libraries are linked.

pub mod compositor;
pub mod decoder;
pub mod encoder;
pub mod pipeline;
pub mod probe;
pub mod remux;
pub mod thumbnail;
pub mod tools;
pub mod types;

pub use compositor::composite;
pub use decoder::{FfmpegDecoder, FrameSource};
pub use encoder::{FfmpegEncoder, FrameSink};
pub use pipeline::{FramePipeline, MaskRefreshPolicy, PipelineReport, PipelineState};
pub use probe::VideoProbe;
pub use remux::{EncodeRequest, FfmpegTranscoder, RemuxStage, Transcoder};
pub use tools::check_tool_available;
pub use types::{Frame, FrameRate, Mask, StreamDescriptor, FOREGROUND_THRESHOLD};
