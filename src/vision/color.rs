use image::{Rgb, RgbImage};

const THRESHOLD: f32 = 0.008856;

#[inline]
fn srgb_to_linear(v: u8) -> f32 {
    let v = v as f32 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > THRESHOLD {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

/// Convert sRGB to CIE L*a*b* (D65), packed into 8 bits per channel:
/// L scaled from 0..100 to 0..255, a and b offset by 128.
pub fn rgb_to_lab(image: &RgbImage) -> RgbImage {
    let mut linear = [0.0f32; 256];
    for (v, slot) in linear.iter_mut().enumerate() {
        *slot = srgb_to_linear(v as u8);
    }

    let mut out = RgbImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        let r = linear[src[0] as usize];
        let g = linear[src[1] as usize];
        let b = linear[src[2] as usize];

        let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / 0.950456;
        let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
        let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / 1.088754;

        let fy = lab_f(y);
        let l = if y > THRESHOLD { 116.0 * fy - 16.0 } else { 903.3 * y };
        let a = 500.0 * (lab_f(x) - fy);
        let bb = 200.0 * (fy - lab_f(z));

        *dst = Rgb([
            (l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8,
            (a + 128.0).round().clamp(0.0, 255.0) as u8,
            (bb + 128.0).round().clamp(0.0, 255.0) as u8,
        ]);
    }
    out
}
