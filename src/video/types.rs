use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VideoError};

/// Represents a single video frame
///
/// This is a simple wrapper around an RGB image buffer that provides
/// convenient methods for pixel manipulation used by filters.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_pixel(width, height, Rgb(color));
        Self { buffer }
    }

    /// Get the width of the frame
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    /// Get the height of the frame
    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Set a pixel at the given coordinates
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.buffer.put_pixel(x, y, Rgb(color));
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Raw interleaved RGB samples, row-major
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    /// Number of bytes one rgb24 frame of the given size occupies
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }
}

/// Pixel values at or above this are foreground
pub const FOREGROUND_THRESHOLD: u8 = 128;

/// Single-channel foreground/background mask at stream resolution.
///
/// A mask is immutable once built; the pipeline replaces it wholesale on
/// each refresh instead of editing it.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    buffer: GrayImage,
}

impl Mask {
    pub fn new(buffer: GrayImage) -> Self {
        Self { buffer }
    }

    /// All-background mask: every pixel gets filtered
    pub fn background(width: u32, height: u32) -> Self {
        Self {
            buffer: ImageBuffer::from_pixel(width, height, Luma([0])),
        }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn value(&self, x: u32, y: u32) -> u8 {
        self.buffer.get_pixel(x, y)[0]
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.value(x, y) >= FOREGROUND_THRESHOLD
    }

    /// True when no pixel reaches the foreground threshold
    pub fn is_all_background(&self) -> bool {
        self.buffer.as_raw().iter().all(|&v| v < FOREGROUND_THRESHOLD)
    }

    pub fn foreground_pixels(&self) -> usize {
        self.buffer
            .as_raw()
            .iter()
            .filter(|&&v| v >= FOREGROUND_THRESHOLD)
            .count()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.buffer
    }

    /// Fail unless the mask matches the given frame size
    pub fn ensure_dimensions(&self, width: u32, height: u32) -> Result<()> {
        if self.width() != width || self.height() != height {
            return Err(VideoError::DimensionMismatch {
                expected_width: width,
                expected_height: height,
                actual_width: self.width(),
                actual_height: self.height(),
            }
            .into());
        }
        Ok(())
    }
}

/// Exact rational frame rate as reported by ffprobe (e.g. 30000/1001)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Parse "num/den" or a plain integer
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        match value.split_once('/') {
            Some((num, den)) => {
                let num = num.trim().parse().ok()?;
                let den = den.trim().parse().ok()?;
                if den == 0 || num == 0 {
                    return None;
                }
                Some(Self { num, den })
            }
            None => {
                let num: u32 = value.parse().ok()?;
                (num > 0).then_some(Self { num, den: 1 })
            }
        }
    }

    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }
}

impl std::fmt::Display for FrameRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Properties of the source video stream, fixed for the duration of one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub has_audio: bool,
}

impl StreamDescriptor {
    pub fn fps(&self) -> f64 {
        self.frame_rate.as_f64()
    }

    pub fn frame_bytes(&self) -> usize {
        Frame::byte_len(self.width, self.height)
    }
}
