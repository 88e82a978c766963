// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Convolution toolkit: separable Gaussian blur and Sobel gradients.
//
// Every read outside the buffer clamps to the nearest edge pixel. Rows are
// processed in parallel; each output row depends only on the input, so the
// result is identical to a sequential pass.

use rayon::prelude::*;

use crate::raster::GrayscaleBuffer;

type Kernel3 = [[f32; 3]; 3];

const SOBEL_KERNEL_X: Kernel3 = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_KERNEL_Y: Kernel3 = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Per-pixel Sobel derivatives. The one-pixel border is left at zero.
#[derive(Debug, Clone)]
pub struct GradientField {
    pub width: usize,
    pub height: usize,
    /// Horizontal derivative.
    pub dx: Vec<f32>,
    /// Vertical derivative.
    pub dy: Vec<f32>,
    /// `sqrt(dx^2 + dy^2)`.
    pub magnitude: Vec<f32>,
}

impl GradientField {
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Largest magnitude in the field.
    pub fn max_magnitude(&self) -> f32 {
        self.magnitude.iter().copied().fold(0.0, f32::max)
    }
}

/// Sampled, L1-normalised Gaussian of length `2 * ceil(3 * sigma) + 1`.
///
/// Returns `[1.0]` for `sigma <= 0`.
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    if !(sigma > 0.0) {
        return vec![1.0];
    }
    let radius = (3.0 * sigma).ceil() as i32;
    let two_sigma_sq = 2.0 * (sigma as f64) * (sigma as f64);
    let raw: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / two_sigma_sq).exp())
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Separable Gaussian blur, horizontal pass then vertical pass.
pub fn gaussian_blur(gray: &GrayscaleBuffer, sigma: f32) -> GrayscaleBuffer {
    if !(sigma > 0.0) {
        return gray.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let w = gray.width() as usize;
    let h = gray.height() as usize;

    // Horizontal pass into f32 so rounding happens once.
    let mut horizontal = vec![0f32; w * h];
    horizontal
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let mut acc = 0.0f32;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = x as isize + k as isize - radius;
                    acc += weight * gray.get(sx, y as isize) as f32;
                }
                *out = acc;
            }
        });

    let mut data = vec![0u8; w * h];
    data.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            let mut acc = 0.0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y as isize + k as isize - radius).clamp(0, h as isize - 1) as usize;
                acc += weight * horizontal[sy * w + x];
            }
            *out = acc.round().clamp(0.0, 255.0) as u8;
        }
    });

    gray.with_data(data)
}

/// Sobel derivatives and magnitude over the interior of `gray`.
pub fn sobel_gradients(gray: &GrayscaleBuffer) -> GradientField {
    let w = gray.width() as usize;
    let h = gray.height() as usize;
    let mut dx = vec![0f32; w * h];
    let mut dy = vec![0f32; w * h];
    let mut magnitude = vec![0f32; w * h];

    if w >= 3 && h >= 3 {
        let samples = gray.data();
        dx.par_chunks_mut(w)
            .zip(dy.par_chunks_mut(w))
            .zip(magnitude.par_chunks_mut(w))
            .enumerate()
            .filter(|(y, _)| *y >= 1 && *y + 1 < h)
            .for_each(|(y, ((out_dx, out_dy), out_mag))| {
                let rows = [
                    &samples[(y - 1) * w..y * w],
                    &samples[y * w..(y + 1) * w],
                    &samples[(y + 1) * w..(y + 2) * w],
                ];
                for x in 1..w - 1 {
                    let mut sum_x = 0.0f32;
                    let mut sum_y = 0.0f32;
                    for (ky, row) in rows.iter().enumerate() {
                        for kx in 0..3 {
                            let v = row[x + kx - 1] as f32;
                            sum_x += v * SOBEL_KERNEL_X[ky][kx];
                            sum_y += v * SOBEL_KERNEL_Y[ky][kx];
                        }
                    }
                    out_dx[x] = sum_x;
                    out_dy[x] = sum_y;
                    out_mag[x] = (sum_x * sum_x + sum_y * sum_y).sqrt();
                }
            });
    }

    GradientField {
        width: w,
        height: h,
        dx,
        dy,
        magnitude,
    }
}
