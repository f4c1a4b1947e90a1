use rayon::prelude::*;

use crate::error::{Result, VideoError};
use crate::video::types::{Frame, Mask, FOREGROUND_THRESHOLD};

/// Blend the original and filtered frames with a hard cut: pixels whose mask
/// value is at or above the threshold keep the original, the rest take the
/// filtered version.
pub fn composite(original: &Frame, filtered: &Frame, mask: &Mask) -> Result<Frame> {
    let (width, height) = (original.width(), original.height());

    if filtered.width() != width || filtered.height() != height {
        return Err(VideoError::DimensionMismatch {
            expected_width: width,
            expected_height: height,
            actual_width: filtered.width(),
            actual_height: filtered.height(),
        }
        .into());
    }
    mask.ensure_dimensions(width, height)?;

    let row_bytes = width as usize * 3;
    let mut output = filtered.as_image().clone();
    if row_bytes == 0 {
        return Ok(Frame::new(output));
    }

    let source = original.as_rgb_bytes();
    let mask_rows = mask.as_image().as_raw().par_chunks(width as usize);

    output
        .par_chunks_mut(row_bytes)
        .zip(source.par_chunks(row_bytes))
        .zip(mask_rows)
        .for_each(|((out_row, src_row), mask_row)| {
            for (x, &m) in mask_row.iter().enumerate() {
                if m >= FOREGROUND_THRESHOLD {
                    let i = x * 3;
                    out_row[i..i + 3].copy_from_slice(&src_row[i..i + 3]);
                }
            }
        });

    Ok(Frame::new(output))
}
