use std::path::Path;
use std::sync::Mutex;

use image::{GrayImage, RgbImage};
use opencv::core::{self, Mat, Rect, Size, Vector};
use opencv::prelude::*;
use opencv::{imgproc, objdetect};
use tracing::debug;

use crate::error::{Result, VisionError};
use crate::vision::{Region, SeedMap, VisionOracle};

/// Cascade shipped with most OpenCV installs
const DEFAULT_CASCADE: &str = "/usr/share/opencv4/haarcascades/haarcascade_frontalface_default.xml";

const SCALE_FACTOR: f64 = 1.1;
const MIN_NEIGHBORS: i32 = 3;
const MIN_FACE_SIZE: i32 = 8;

/// Haar cascade face detection + GrabCut segmentation
pub struct OpenCvOracle {
    // detect_multi_scale needs &mut self
    cascade: Mutex<objdetect::CascadeClassifier>,
}

impl OpenCvOracle {
    pub fn new(cascade_path: Option<&Path>) -> Result<Self> {
        let path = cascade_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| DEFAULT_CASCADE.to_string());

        let cascade = objdetect::CascadeClassifier::new(&path).map_err(|e| {
            VisionError::BackendUnavailable {
                backend: format!("opencv cascade {}: {}", path, e),
            }
        })?;

        if cascade.empty().unwrap_or(true) {
            return Err(VisionError::BackendUnavailable {
                backend: format!("opencv cascade {} is empty", path),
            }
            .into());
        }

        debug!("Loaded face cascade from {}", path);
        Ok(Self {
            cascade: Mutex::new(cascade),
        })
    }
}

fn detection_error(e: opencv::Error) -> VisionError {
    VisionError::DetectionFailed {
        reason: e.to_string(),
    }
}

fn segmentation_error(e: opencv::Error) -> VisionError {
    VisionError::SegmentationFailed {
        reason: e.to_string(),
    }
}

impl VisionOracle for OpenCvOracle {
    fn name(&self) -> &str {
        "opencv"
    }

    fn detect_faces(&self, gray: &GrayImage) -> Result<Vec<Region>> {
        let mat = Mat::new_rows_cols_with_data(gray.height() as i32, gray.width() as i32, gray.as_raw().as_slice())
            .map_err(detection_error)?;

        let mut faces = Vector::<Rect>::new();
        let mut cascade = self.cascade.lock().map_err(|_| VisionError::DetectionFailed {
            reason: "face cascade lock poisoned".to_string(),
        })?;
        cascade
            .detect_multi_scale(
                &*mat,
                &mut faces,
                SCALE_FACTOR,
                MIN_NEIGHBORS,
                objdetect::CASCADE_SCALE_IMAGE,
                Size::new(MIN_FACE_SIZE, MIN_FACE_SIZE),
                Size::new(0, 0),
            )
            .map_err(detection_error)?;

        Ok(faces
            .iter()
            .filter(|r| r.width > 0 && r.height > 0)
            .map(|r| Region::new(r.x.max(0) as u32, r.y.max(0) as u32, r.width as u32, r.height as u32))
            .collect())
    }

    fn refine_mask(&self, image: &RgbImage, seeds: &SeedMap, iterations: u32) -> Result<SeedMap> {
        let rows = image.height() as i32;
        let cols = image.width() as i32;

        let pixels: Vec<core::Vec3b> = image
            .pixels()
            .map(|p| core::Vec3b::from([p[0], p[1], p[2]]))
            .collect();
        let img = Mat::new_rows_cols_with_data(rows, cols, pixels.as_slice()).map_err(segmentation_error)?;

        let codes = seeds.codes();
        let mut mask = Mat::new_rows_cols_with_data(rows, cols, codes.as_slice())
            .and_then(|m| m.try_clone())
            .map_err(segmentation_error)?;

        let mut bgd_model = Mat::default();
        let mut fgd_model = Mat::default();
        imgproc::grab_cut(
            &*img,
            &mut mask,
            Rect::default(),
            &mut bgd_model,
            &mut fgd_model,
            iterations as i32,
            imgproc::GC_INIT_WITH_MASK,
        )
        .map_err(segmentation_error)?;

        let refined = mask.data_bytes().map_err(segmentation_error)?;
        SeedMap::from_codes(seeds.width(), seeds.height(), refined)
    }
}
