use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use tracing::debug;

use crate::error::{CompositorError, Result, VideoError};
use crate::video::decoder::FrameSource;
use crate::video::types::Frame;

const JPEG_QUALITY: u8 = 85;

/// Thumbnail size for a frame scaled to `target_width`, keeping aspect and an
/// even height
pub fn thumbnail_size(width: u32, height: u32, target_width: u32) -> (u32, u32) {
    let target_width = target_width.max(2);
    let scaled = (height as f64 * target_width as f64 / width.max(1) as f64).round() as u32;
    let even = (scaled / 2 * 2).max(2);
    (target_width, even)
}

/// Encode a scaled-down JPEG of `frame` to `scratch`, then rename it to `output`
pub fn write_thumbnail(frame: &Frame, target_width: u32, scratch: &Path, output: &Path) -> Result<()> {
    let (w, h) = thumbnail_size(frame.width(), frame.height(), target_width);
    let small = imageops::resize(frame.as_image(), w, h, FilterType::Triangle);

    let encode = || -> Result<()> {
        let file = File::create(scratch)?;
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
            .encode_image(&small)
            .map_err(|e| VideoError::EncodeFailed {
                reason: format!("thumbnail encode failed: {}", e),
            })?;
        Ok(())
    };

    if let Err(e) = encode() {
        let _ = std::fs::remove_file(scratch);
        return Err(e);
    }

    std::fs::rename(scratch, output).map_err(|e| {
        let _ = std::fs::remove_file(scratch);
        CompositorError::from(e)
    })?;

    debug!("Thumbnail {}x{} written to {}", w, h, output.display());
    Ok(())
}

/// Thumbnail of the first frame a source yields
pub fn thumbnail_from_source(source: &mut dyn FrameSource, target_width: u32, scratch: &Path, output: &Path) -> Result<()> {
    let frame = source.next_frame()?.ok_or_else(|| VideoError::DecodeFailed {
        reason: "result has no frames to thumbnail".to_string(),
    })?;
    write_thumbnail(&frame, target_width, scratch, output)
}
