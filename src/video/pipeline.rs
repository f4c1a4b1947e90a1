use tracing::{debug, info};

use crate::error::{CompositorError, Result};
use crate::filters::FilterKind;
use crate::video::compositor::composite;
use crate::video::decoder::FrameSource;
use crate::video::encoder::FrameSink;
use crate::video::types::Mask;
use crate::vision::MaskEstimator;

/// Mask recomputations per second of source video
pub const MASK_REFRESHES_PER_SECOND: f64 = 2.0;

/// Decides which frame indices get a freshly estimated mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskRefreshPolicy {
    interval: u64,
}

impl MaskRefreshPolicy {
    /// Interval of `floor(fps / 2)` frames, never less than one
    pub fn from_fps(fps: f64) -> Self {
        let frames = fps / MASK_REFRESHES_PER_SECOND;
        let interval = if frames.is_finite() && frames >= 1.0 {
            frames.floor() as u64
        } else {
            1
        };
        Self { interval }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn should_refresh(&self, index: u64) -> bool {
        index % self.interval == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Opened,
    Streaming,
    Finalized,
}

/// Counters from one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub frames_in: u64,
    pub frames_out: u64,
    pub mask_refreshes: u64,
}

/// Streams frames from a source through filter and compositor into a sink.
///
/// The current mask is owned here and swapped out whole on each refresh;
/// frames between refreshes reuse it.
pub struct FramePipeline<S: FrameSource, K: FrameSink> {
    source: S,
    sink: K,
    estimator: MaskEstimator,
    filter: FilterKind,
    policy: MaskRefreshPolicy,
    current_mask: Option<Mask>,
    state: PipelineState,
    report: PipelineReport,
}

impl<S: FrameSource, K: FrameSink> FramePipeline<S, K> {
    pub fn new(source: S, sink: K, estimator: MaskEstimator, filter: FilterKind) -> Self {
        let policy = MaskRefreshPolicy::from_fps(source.descriptor().fps());
        Self {
            source,
            sink,
            estimator,
            filter,
            policy,
            current_mask: None,
            state: PipelineState::Opened,
            report: PipelineReport::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn policy(&self) -> MaskRefreshPolicy {
        self.policy
    }

    /// Process every frame in order, then close the sink
    pub fn run(&mut self) -> Result<PipelineReport> {
        if self.state != PipelineState::Opened {
            return Err(CompositorError::generic("pipeline has already been run"));
        }

        let descriptor = *self.source.descriptor();
        info!(
            "Streaming {}x{} @ {:.2} fps with {} filter via {} oracle, mask refresh every {} frames",
            descriptor.width,
            descriptor.height,
            descriptor.fps(),
            self.filter,
            self.estimator.oracle_name(),
            self.policy.interval()
        );
        self.state = PipelineState::Streaming;

        while let Some(frame) = self.source.next_frame()? {
            let index = self.report.frames_in;
            self.report.frames_in += 1;

            if self.current_mask.is_none() || self.policy.should_refresh(index) {
                let mask = self.estimator.estimate(&frame)?;
                debug!(
                    "Mask refreshed at frame {}: {} foreground pixels",
                    index,
                    mask.foreground_pixels()
                );
                self.current_mask = Some(mask);
                self.report.mask_refreshes += 1;
            }

            let mask = match self.current_mask.as_ref() {
                Some(mask) => mask,
                None => return Err(CompositorError::generic("no mask available")),
            };

            let filtered = self.filter.apply(&frame);
            let output = composite(&frame, &filtered, mask)?;
            self.sink.write_frame(&output)?;
            self.report.frames_out += 1;
        }

        self.sink.finish()?;
        self.current_mask = None;
        self.state = PipelineState::Finalized;

        info!(
            "Pipeline finalized: {} frames, {} mask refreshes",
            self.report.frames_out, self.report.mask_refreshes
        );
        Ok(self.report)
    }
}
