use image::{GrayImage, RgbImage};

use crate::error::Result;
use crate::vision::{Region, SeedMap, VisionOracle};

/// Backend used when no native vision library is compiled in.
///
/// It never reports a face, so the estimator always falls back to an
/// all-background mask and the filter covers whole frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOracle;

impl VisionOracle for NullOracle {
    fn name(&self) -> &str {
        "none"
    }

    fn detect_faces(&self, _gray: &GrayImage) -> Result<Vec<Region>> {
        Ok(Vec::new())
    }

    fn refine_mask(&self, _image: &RgbImage, seeds: &SeedMap, _iterations: u32) -> Result<SeedMap> {
        Ok(seeds.clone())
    }
}
