use rayon::prelude::*;

use crate::video::types::Frame;

const SEPIA: [[f32; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

/// Classic sepia tone remap, saturating at 255
pub fn sepia(frame: &Frame) -> Frame {
    let mut buffer = frame.as_image().clone();

    buffer.par_chunks_exact_mut(3).for_each(|px| {
        let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
        for (channel, row) in px.iter_mut().zip(SEPIA.iter()) {
            let v = row[0] * r + row[1] * g + row[2] * b;
            *channel = v.round().min(255.0) as u8;
        }
    });

    Frame::new(buffer)
}
