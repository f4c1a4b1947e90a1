use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};
use tracing::debug;

use crate::error::{Result, VisionError};
use crate::video::types::{Frame, Mask};
use crate::vision::{rgb_to_lab, Region, SeedClass, SeedMap, VisionOracle};

/// Detection and segmentation run on frames shrunk by this factor
pub const DOWNSCALE_FACTOR: u32 = 4;

/// Refinement passes requested from the segmenter
pub const SEGMENTATION_ITERATIONS: u32 = 4;

/// Body region extends this many face widths to each side of the face
pub const BODY_SIDE_MULTIPLIER: f64 = 1.2;

/// Body region extends this many face heights below the face
pub const BODY_DOWN_MULTIPLIER: f64 = 2.0;

/// Produces a full-resolution foreground mask for one frame.
///
/// The mask covers the largest detected face plus a torso-shaped extension
/// below it, refined by the oracle's segmenter. When no face is found the
/// whole frame is background.
#[derive(Clone)]
pub struct MaskEstimator {
    oracle: Arc<dyn VisionOracle>,
}

impl MaskEstimator {
    pub fn new(oracle: Arc<dyn VisionOracle>) -> Self {
        Self { oracle }
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    pub fn estimate(&self, frame: &Frame) -> Result<Mask> {
        let (width, height) = (frame.width(), frame.height());
        let small_w = (width / DOWNSCALE_FACTOR).max(1);
        let small_h = (height / DOWNSCALE_FACTOR).max(1);

        let small = imageops::resize(frame.as_image(), small_w, small_h, FilterType::Triangle);
        let gray = imageops::grayscale(&small);

        let face = match self.oracle.detect_largest_face(&gray)? {
            Some(face) => face,
            None => {
                debug!("No face detected, whole frame is background");
                return Ok(Mask::background(width, height));
            }
        };
        debug!(
            "Largest face at ({}, {}) {}x{} on {}x{} detection image",
            face.x, face.y, face.width, face.height, small_w, small_h
        );

        let seeds = build_seed_map(small_w, small_h, &face);
        let lab = rgb_to_lab(&small);
        let refined = self.oracle.refine_mask(&lab, &seeds, SEGMENTATION_ITERATIONS)?;

        if refined.width() != small_w || refined.height() != small_h {
            return Err(VisionError::SeedMapMismatch {
                expected_width: small_w,
                expected_height: small_h,
                actual_width: refined.width(),
                actual_height: refined.height(),
            }
            .into());
        }

        let binary = binarize(&refined);
        let full = imageops::resize(&binary, width, height, FilterType::Nearest);
        Ok(Mask::new(clean_up(&full)))
    }
}

/// Border strip width on the detection image
pub fn border_width(width: u32, height: u32) -> u32 {
    (width.min(height) / 100).max(2)
}

/// Seed map: definite-background border, probable-foreground face and body,
/// probable background everywhere else.
pub fn build_seed_map(width: u32, height: u32, face: &Region) -> SeedMap {
    let mut seeds = SeedMap::new(width, height, SeedClass::ProbableBackground);

    let border = border_width(width, height);
    seeds.fill_rect(0, 0, width, border, SeedClass::Background);
    seeds.fill_rect(0, height.saturating_sub(border), width, height, SeedClass::Background);
    seeds.fill_rect(0, 0, border, height, SeedClass::Background);
    seeds.fill_rect(width.saturating_sub(border), 0, width, height, SeedClass::Background);

    seeds.fill_rect(
        face.x,
        face.y,
        face.x.saturating_add(face.width),
        face.y.saturating_add(face.height),
        SeedClass::ProbableForeground,
    );

    let (x1, y1, x2, y2) = body_extent(width, height, face);
    if x2 > x1 && y2 > y1 {
        seeds.fill_rect(x1, y1, x2, y2, SeedClass::ProbableForeground);
    }

    seeds
}

/// Torso approximation below the face as (x1, y1, x2, y2), clipped to the image
pub fn body_extent(width: u32, height: u32, face: &Region) -> (u32, u32, u32, u32) {
    let fw = face.width as f64;
    let fh = face.height as f64;
    let cx = face.x as f64 + fw / 2.0;

    let x1 = (cx - fw / 2.0 - BODY_SIDE_MULTIPLIER * fw).floor().max(0.0) as u32;
    let x2 = ((cx + fw / 2.0 + BODY_SIDE_MULTIPLIER * fw).ceil() as u32).min(width);
    let y1 = face.y.saturating_add(face.height);
    let y2 = ((face.y as f64 + fh + BODY_DOWN_MULTIPLIER * fh).ceil() as u32).min(height);

    (x1, y1, x2, y2)
}

fn binarize(classes: &SeedMap) -> GrayImage {
    GrayImage::from_fn(classes.width(), classes.height(), |x, y| {
        if classes.get(x, y).is_foreground() {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Odd kernel size for the morphology pass, scaled with frame size
pub fn kernel_size(width: u32, height: u32) -> u32 {
    ((width.min(height) / 100) | 1).max(3)
}

/// Close then open with a disk-shaped kernel to drop speckles and fill holes
fn clean_up(mask: &GrayImage) -> GrayImage {
    let radius = (kernel_size(mask.width(), mask.height()) / 2).min(u8::MAX as u32) as u8;
    let closed = close(mask, Norm::L2, radius);
    open(&closed, Norm::L2, radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Finds a fixed face (in detection-image coordinates) and accepts the
    /// seeds as the segmentation result.
    struct ScriptedOracle {
        face: Option<Region>,
        refine_calls: AtomicUsize,
    }

    impl ScriptedOracle {
        fn new(face: Option<Region>) -> Self {
            Self { face, refine_calls: AtomicUsize::new(0) }
        }
    }

    impl VisionOracle for ScriptedOracle {
        fn name(&self) -> &str {
            "scripted"
        }

        fn detect_faces(&self, _gray: &GrayImage) -> Result<Vec<Region>> {
            Ok(self.face.into_iter().collect())
        }

        fn refine_mask(&self, image: &RgbImage, seeds: &SeedMap, iterations: u32) -> Result<SeedMap> {
            assert_eq!(image.dimensions(), (seeds.width(), seeds.height()));
            assert_eq!(iterations, SEGMENTATION_ITERATIONS);
            self.refine_calls.fetch_add(1, Ordering::SeqCst);
            Ok(seeds.clone())
        }
    }

    struct FailingSegmenter;

    impl VisionOracle for FailingSegmenter {
        fn name(&self) -> &str {
            "failing"
        }

        fn detect_faces(&self, _gray: &GrayImage) -> Result<Vec<Region>> {
            Ok(vec![Region::new(10, 10, 10, 10)])
        }

        fn refine_mask(&self, _image: &RgbImage, _seeds: &SeedMap, _iterations: u32) -> Result<SeedMap> {
            Err(VisionError::SegmentationFailed { reason: "no samples".into() }.into())
        }
    }

    #[test]
    fn test_no_face_gives_all_background_mask() {
        let oracle = Arc::new(ScriptedOracle::new(None));
        let estimator = MaskEstimator::new(oracle.clone());

        for (w, h) in [(64, 48), (101, 77), (3, 3), (1, 1)] {
            let mask = estimator.estimate(&Frame::new_filled(w, h, [90, 90, 90])).unwrap();
            assert_eq!((mask.width(), mask.height()), (w, h));
            assert!(mask.is_all_background());
        }
        assert_eq!(oracle.refine_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_mask_matches_frame_size_for_odd_dimensions() {
        let oracle = Arc::new(ScriptedOracle::new(Some(Region::new(10, 5, 6, 6))));
        let estimator = MaskEstimator::new(oracle);

        for (w, h) in [(130, 101), (127, 99), (160, 120), (163, 90)] {
            let mask = estimator.estimate(&Frame::new_filled(w, h, [10, 20, 30])).unwrap();
            assert_eq!((mask.width(), mask.height()), (w, h), "for {}x{}", w, h);
        }
    }

    #[test]
    fn test_centered_face_keeps_face_and_body() {
        // 400x400 frame -> 100x100 detection image, face 20x20 at (40, 20)
        let oracle = Arc::new(ScriptedOracle::new(Some(Region::new(40, 20, 20, 20))));
        let estimator = MaskEstimator::new(oracle.clone());
        let mask = estimator.estimate(&Frame::new_filled(400, 400, [120, 80, 60])).unwrap();

        assert_eq!(oracle.refine_calls.load(Ordering::SeqCst), 1);
        // face centre
        assert!(mask.is_foreground(200, 120));
        // torso, below the face and out to the side
        assert!(mask.is_foreground(200, 250));
        assert!(mask.is_foreground(90, 250));
        // above the face and far corners stay background
        assert!(!mask.is_foreground(200, 20));
        assert!(!mask.is_foreground(5, 395));
        assert!(!mask.is_foreground(395, 5));
    }

    #[test]
    fn test_segmentation_failure_propagates() {
        let estimator = MaskEstimator::new(Arc::new(FailingSegmenter));
        let err = estimator.estimate(&Frame::new_filled(80, 80, [0, 0, 0])).unwrap_err();
        assert!(err.to_string().contains("no samples"));
    }

    #[test]
    fn test_seed_map_layout() {
        let face = Region::new(40, 20, 20, 20);
        let seeds = build_seed_map(100, 100, &face);

        assert_eq!(seeds.get(0, 50), SeedClass::Background);
        assert_eq!(seeds.get(99, 50), SeedClass::Background);
        assert_eq!(seeds.get(50, 1), SeedClass::Background);
        assert_eq!(seeds.get(50, 30), SeedClass::ProbableForeground);
        assert_eq!(seeds.get(50, 60), SeedClass::ProbableForeground);
        assert_eq!(seeds.get(50, 10), SeedClass::ProbableBackground);
        assert_eq!(seeds.get(10, 30), SeedClass::ProbableBackground);
    }

    #[test]
    fn test_body_extent() {
        // face 20 wide at x=40: centre 50, half-width 10, side extension 24
        let (x1, y1, x2, y2) = body_extent(100, 100, &Region::new(40, 20, 20, 20));
        assert_eq!((x1, y1, x2, y2), (16, 40, 84, 80));

        // clipped at the edges
        let (x1, _, x2, y2) = body_extent(50, 50, &Region::new(2, 30, 20, 10));
        assert_eq!(x1, 0);
        assert_eq!(x2, 46);
        assert_eq!(y2, 50);
    }

    #[test]
    fn test_kernel_size_is_odd_and_at_least_three() {
        assert_eq!(kernel_size(64, 48), 3);
        assert_eq!(kernel_size(1920, 1080), 11);
        assert_eq!(kernel_size(1280, 720), 7);
        assert_eq!(kernel_size(4000, 3000), 31);
        for (w, h) in [(10, 10), (640, 480), (1000, 800), (3840, 2160)] {
            let k = kernel_size(w, h);
            assert!(k >= 3 && k % 2 == 1);
        }
    }

    #[test]
    fn test_border_width_minimum() {
        assert_eq!(border_width(40, 30), 2);
        assert_eq!(border_width(480, 270), 2);
        assert_eq!(border_width(960, 540), 5);
    }
}
