//! # Vision Module
//!
//! Foreground mask estimation. The face detector and the seeded segmenter are
//! supplied by a [`VisionOracle`] so the backend (a native CV library, a
//! remote inference service, or a scripted mock) can be swapped without
//! touching the pipeline.
//!
//! ## Backends
//!
//! - [`NullOracle`]: never finds a face, so every frame is filtered in full
//! - `OpenCvOracle`: Haar cascade + GrabCut, behind the `opencv` feature

mod color;
mod estimator;
mod null;
#[cfg(feature = "opencv")]
mod opencv_backend;

use std::sync::Arc;

use image::{GrayImage, RgbImage};
use tracing::{info, warn};

use crate::config::{VisionBackend, VisionConfig};
use crate::error::{Result, VisionError};

pub use color::rgb_to_lab;
pub use estimator::{MaskEstimator, BODY_DOWN_MULTIPLIER, BODY_SIDE_MULTIPLIER, DOWNSCALE_FACTOR, SEGMENTATION_ITERATIONS};
pub use null::NullOracle;
#[cfg(feature = "opencv")]
pub use opencv_backend::OpenCvOracle;

/// Axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Initial classification of a pixel handed to the segmenter.
///
/// Discriminants follow the GrabCut convention so native backends can use
/// the bytes directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SeedClass {
    Background = 0,
    Foreground = 1,
    ProbableBackground = 2,
    ProbableForeground = 3,
}

impl SeedClass {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SeedClass::Background),
            1 => Some(SeedClass::Foreground),
            2 => Some(SeedClass::ProbableBackground),
            3 => Some(SeedClass::ProbableForeground),
            _ => None,
        }
    }

    pub fn is_foreground(&self) -> bool {
        matches!(self, SeedClass::Foreground | SeedClass::ProbableForeground)
    }
}

/// Per-pixel seed classes at the downscaled resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedMap {
    width: u32,
    height: u32,
    classes: Vec<SeedClass>,
}

impl SeedMap {
    pub fn new(width: u32, height: u32, fill: SeedClass) -> Self {
        Self {
            width,
            height,
            classes: vec![fill; width as usize * height as usize],
        }
    }

    /// Build from GrabCut-style class codes, rejecting unknown codes
    pub fn from_codes(width: u32, height: u32, codes: &[u8]) -> Result<Self> {
        if codes.len() != width as usize * height as usize {
            return Err(VisionError::SegmentationFailed {
                reason: format!(
                    "expected {} class codes for {}x{}, got {}",
                    width as usize * height as usize,
                    width,
                    height,
                    codes.len()
                ),
            }
            .into());
        }

        let classes = codes
            .iter()
            .map(|&code| {
                SeedClass::from_code(code).ok_or_else(|| VisionError::SegmentationFailed {
                    reason: format!("unknown class code {}", code),
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { width, height, classes })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> SeedClass {
        self.classes[y as usize * self.width as usize + x as usize]
    }

    /// Fill the half-open rectangle [x1, x2) × [y1, y2), clipped to the map
    pub fn fill_rect(&mut self, x1: u32, y1: u32, x2: u32, y2: u32, class: SeedClass) {
        let x2 = x2.min(self.width);
        let y2 = y2.min(self.height);
        for y in y1..y2 {
            let row = y as usize * self.width as usize;
            for x in x1..x2 {
                self.classes[row + x as usize] = class;
            }
        }
    }

    pub fn codes(&self) -> Vec<u8> {
        self.classes.iter().map(|&c| c as u8).collect()
    }

    pub fn classes(&self) -> &[SeedClass] {
        &self.classes
    }
}

/// External detection + segmentation capability
pub trait VisionOracle: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// All face regions found in a grayscale image
    fn detect_faces(&self, gray: &GrayImage) -> Result<Vec<Region>>;

    /// Refine a seed map into a per-pixel class using image content.
    ///
    /// `image` is a three-channel perceptual colour image with the same
    /// dimensions as `seeds`.
    fn refine_mask(&self, image: &RgbImage, seeds: &SeedMap, iterations: u32) -> Result<SeedMap>;

    /// The single face with the largest area, if any. Ties keep the
    /// earliest detection.
    fn detect_largest_face(&self, gray: &GrayImage) -> Result<Option<Region>> {
        Ok(self
            .detect_faces(gray)?
            .into_iter()
            .reduce(|best, region| if region.area() > best.area() { region } else { best }))
    }
}

/// Build the oracle selected in the configuration
pub fn create_oracle(config: &VisionConfig) -> Result<Arc<dyn VisionOracle>> {
    match config.backend {
        VisionBackend::None => {
            warn!("No vision backend configured - no subject will be detected, backgrounds cover whole frames");
            Ok(Arc::new(NullOracle))
        }
        #[cfg(feature = "opencv")]
        VisionBackend::OpenCv => {
            let oracle = OpenCvOracle::new(config.cascade_path.as_deref())?;
            info!("Initialized OpenCV vision backend");
            Ok(Arc::new(oracle))
        }
        #[cfg(not(feature = "opencv"))]
        VisionBackend::OpenCv => {
            info!("OpenCV backend requested but this build lacks the 'opencv' feature");
            Err(VisionError::BackendUnavailable {
                backend: "opencv".to_string(),
            }
            .into())
        }
    }
}
