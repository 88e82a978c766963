// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the richtwerk-imaging crate: the convolution
// kernels, the adaptive median filter and a full pipeline run on a small
// synthetic rotated page.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use richtwerk_core::PipelineConfig;
use richtwerk_imaging::filters::{AdaptiveMedianFilter, gaussian_blur, sobel_gradients};
use richtwerk_imaging::{DocumentPipeline, ImageCodec, RasterBuffer};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Light page with dark bars, rotated by `angle` degrees on a black canvas.
fn rotated_page(width: u32, height: u32, angle: f64) -> RasterBuffer {
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let (half_w, half_h) = (width as f64 * 0.38, height as f64 * 0.35);
    let (s, c) = angle.to_radians().sin_cos();
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let (dx, dy) = (x as f64 - cx, y as f64 - cy);
            let u = c * dx + s * dy;
            let v = -s * dx + c * dy;
            let value = if u.abs() > half_w || v.abs() > half_h {
                0
            } else if (v + half_h) as i64 % 24 < 4 && u.abs() < half_w - 20.0 {
                70
            } else {
                250
            };
            data.extend_from_slice(&[value, value, value]);
        }
    }
    RasterBuffer::new(width, height, 3, data).expect("fixture raster")
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_kernels(c: &mut Criterion) {
    let gray = rotated_page(400, 300, 5.0).to_grayscale();

    c.bench_function("gaussian_blur sigma 1.5 (400x300)", |b| {
        b.iter(|| black_box(gaussian_blur(black_box(&gray), 1.5)));
    });
    c.bench_function("sobel_gradients (400x300)", |b| {
        b.iter(|| black_box(sobel_gradients(black_box(&gray))));
    });
}

fn bench_median(c: &mut Criterion) {
    let raster = rotated_page(400, 300, 5.0);
    let filter = AdaptiveMedianFilter::new(7);

    c.bench_function("adaptive_median window 7 (400x300)", |b| {
        b.iter(|| black_box(filter.apply(black_box(&raster))));
    });
}

/// Full normalisation of a 320x240 page rotated by 5 degrees.
fn bench_pipeline(c: &mut Criterion) {
    let raster = rotated_page(320, 240, 5.0);
    let config = PipelineConfig::default();
    let codec = ImageCodec::new();

    c.bench_function("pipeline run (320x240)", |b| {
        b.iter(|| {
            let result = DocumentPipeline::new(&config, &codec)
                .expect("pipeline")
                .run(black_box(raster.clone()))
                .expect("pipeline run");
            black_box(result.output_metrics.overall);
        });
    });
}

criterion_group!(benches, bench_kernels, bench_median, bench_pipeline);
criterion_main!(benches);
