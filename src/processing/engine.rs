use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{CompositorError, Result};
use crate::filters::FilterKind;
use crate::video::{
    check_tool_available, thumbnail, FfmpegDecoder, FfmpegEncoder, FfmpegTranscoder, FramePipeline, PipelineReport,
    RemuxStage, StreamDescriptor, Transcoder, VideoProbe,
};
use crate::vision::{MaskEstimator, VisionOracle};

/// Files touched by one run. All scratch paths are unique to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessPaths {
    pub source: PathBuf,
    /// Video-only stream written by the frame pipeline
    pub intermediate: PathBuf,
    /// Remux target before it is renamed to `output`
    pub remux_scratch: PathBuf,
    pub output: PathBuf,
    /// Scratch and final path of the thumbnail, when one is wanted
    pub thumbnail: Option<(PathBuf, PathBuf)>,
}

/// What a successful run produced
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub descriptor: StreamDescriptor,
    pub report: PipelineReport,
    pub output: PathBuf,
    pub thumbnail: Option<PathBuf>,
}

/// Runs a filter over a local video file. Implementations block.
pub trait VideoProcessor: Send + Sync {
    fn process(&self, filter: FilterKind, paths: &ProcessPaths) -> Result<ProcessOutcome>;
}

/// Orchestrates one job:
/// 1. Probe - read size, exact frame rate and audio presence
/// 2. Frame Pipeline - decode, estimate masks, filter, composite, encode
/// 3. Remux - final encode with the source audio, atomic publish
/// 4. Thumbnail - first frame of the result, failure is not fatal
pub struct ProcessingEngine {
    config: Config,
    estimator: MaskEstimator,
    transcoder: Arc<dyn Transcoder>,
    pool: rayon::ThreadPool,
}

impl ProcessingEngine {
    pub fn new(config: Config, oracle: Arc<dyn VisionOracle>) -> Result<Self> {
        let transcoder = Arc::new(FfmpegTranscoder::new(config.video.ffmpeg_path.clone()));
        Self::with_transcoder(config, oracle, transcoder)
    }

    pub fn with_transcoder(config: Config, oracle: Arc<dyn VisionOracle>, transcoder: Arc<dyn Transcoder>) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.video.processing_threads.max(1))
            .thread_name(|i| format!("frame-worker-{}", i))
            .build()
            .map_err(|e| CompositorError::generic(format!("failed to build frame thread pool: {}", e)))?;

        if !check_tool_available(&config.video.ffmpeg_path) {
            warn!(
                "{} is not runnable; jobs will fail until it is installed",
                config.video.ffmpeg_path.display()
            );
        }

        info!(
            "Processing engine ready: {} frame threads, vision backend '{}'",
            pool.current_num_threads(),
            oracle.name()
        );

        Ok(Self {
            config,
            estimator: MaskEstimator::new(oracle),
            transcoder,
            pool,
        })
    }

    // ==========================================
    // STEP 1: PROBE
    // ==========================================

    fn probe(&self, source: &Path) -> Result<StreamDescriptor> {
        info!("🔍 Step 1: Probing {}", source.display());
        VideoProbe::new(self.config.video.ffprobe_path.clone()).probe(source)
    }

    // ==========================================
    // STEP 2: FRAME PIPELINE
    // ==========================================

    fn run_pipeline(&self, filter: FilterKind, descriptor: StreamDescriptor, paths: &ProcessPaths) -> Result<PipelineReport> {
        info!("🎞️  Step 2: Filtering frames ({})", filter);
        let ffmpeg = &self.config.video.ffmpeg_path;

        let decoder = FfmpegDecoder::open(ffmpeg, &paths.source, descriptor)?;
        let encoder = FfmpegEncoder::create(ffmpeg, &paths.intermediate, descriptor, &self.config.encoding)?;
        let mut pipeline = FramePipeline::new(decoder, encoder, self.estimator.clone(), filter);

        // rayon work inside filter and composite lands on our pool
        self.pool.install(|| pipeline.run())
    }

    // ==========================================
    // STEP 3: REMUX
    // ==========================================

    fn remux(&self, descriptor: &StreamDescriptor, paths: &ProcessPaths) -> Result<()> {
        info!("📦 Step 3: Remuxing into {}", paths.output.display());
        RemuxStage::new(self.transcoder.as_ref(), self.config.encoding.clone()).run(
            &paths.intermediate,
            &paths.source,
            descriptor.has_audio,
            &paths.remux_scratch,
            &paths.output,
        )
    }

    // ==========================================
    // STEP 4: THUMBNAIL
    // ==========================================

    fn thumbnail(&self, descriptor: StreamDescriptor, output: &Path, scratch: &Path, target: &Path) -> Option<PathBuf> {
        debug!("🖼️  Step 4: Thumbnail {}", target.display());
        let result = FfmpegDecoder::open(&self.config.video.ffmpeg_path, output, descriptor).and_then(|mut decoder| {
            thumbnail::thumbnail_from_source(&mut decoder, self.config.thumbnail.width, scratch, target)
        });

        match result {
            Ok(()) => Some(target.to_path_buf()),
            Err(e) => {
                warn!("Thumbnail generation failed for {}: {}", output.display(), e);
                None
            }
        }
    }
}

impl VideoProcessor for ProcessingEngine {
    fn process(&self, filter: FilterKind, paths: &ProcessPaths) -> Result<ProcessOutcome> {
        let descriptor = self.probe(&paths.source)?;
        let report = self.run_pipeline(filter, descriptor, paths)?;
        self.remux(&descriptor, paths)?;

        let thumbnail = match (&paths.thumbnail, self.config.thumbnail.enabled) {
            (Some((scratch, target)), true) => self.thumbnail(descriptor, &paths.output, scratch, target),
            _ => None,
        };

        info!("🎉 Finished {}: {} frames", paths.output.display(), report.frames_out);
        Ok(ProcessOutcome {
            descriptor,
            report,
            output: paths.output.clone(),
            thumbnail,
        })
    }
}
