//! Per-frame cost benchmarks
//!
//! Covers the work done on every frame (filter + composite) and the mask
//! estimation done on refresh frames, at common output sizes.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{GrayImage, Luma};

use backdrop_compositor::filters::FilterKind;
use backdrop_compositor::video::{composite, Frame, Mask};
use backdrop_compositor::vision::{MaskEstimator, NullOracle};

const SIZES: [(u32, u32); 3] = [(640, 360), (1280, 720), (1920, 1080)];

/// Deterministic gradient frame
fn test_frame(width: u32, height: u32) -> Frame {
    let mut frame = Frame::new_filled(width, height, [0, 0, 0]);
    for y in 0..height {
        for x in 0..width {
            frame.set_pixel(x, y, [(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]);
        }
    }
    frame
}

/// Centre ellipse marked foreground
fn test_mask(width: u32, height: u32) -> Mask {
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    Mask::new(GrayImage::from_fn(width, height, |x, y| {
        let dx = (x as f64 - cx) / (width as f64 / 4.0);
        let dy = (y as f64 - cy) / (height as f64 / 3.0);
        Luma([if dx * dx + dy * dy <= 1.0 { 255 } else { 0 }])
    }))
}

fn bench_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite");

    for (width, height) in SIZES {
        let original = test_frame(width, height);
        let filtered = FilterKind::Grayscale.apply(&original);
        let mask = test_mask(width, height);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &(original, filtered, mask),
            |b, (original, filtered, mask)| {
                b.iter(|| black_box(composite(black_box(original), black_box(filtered), black_box(mask)).unwrap()));
            },
        );
    }
    group.finish();
}

fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");
    let frame = test_frame(1280, 720);

    for filter in [FilterKind::Grayscale, FilterKind::Sepia, FilterKind::Identity] {
        group.bench_with_input(BenchmarkId::from_parameter(filter.name()), &frame, |b, frame| {
            b.iter(|| black_box(filter.apply(black_box(frame))));
        });
    }
    group.finish();
}

fn bench_mask_estimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate_no_face");
    group.sample_size(20);
    let estimator = MaskEstimator::new(Arc::new(NullOracle));

    for (width, height) in SIZES {
        let frame = test_frame(width, height);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &frame,
            |b, frame| {
                b.iter(|| black_box(estimator.estimate(black_box(frame)).unwrap()));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_composite, bench_filters, bench_mask_estimation);
criterion_main!(benches);
