use rayon::prelude::*;

use crate::video::types::Frame;

/// BT.601 luma in 14-bit fixed point, rounded
#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192) >> 14) as u8
}

/// Replace every pixel with its luma on all three channels
pub fn grayscale(frame: &Frame) -> Frame {
    let mut buffer = frame.as_image().clone();

    buffer.par_chunks_exact_mut(3).for_each(|px| {
        let y = luma(px[0], px[1], px[2]);
        px[0] = y;
        px[1] = y;
        px[2] = y;
    });

    Frame::new(buffer)
}
