// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pixel-level filters: convolution toolkit, noise reduction, enhancement.

pub mod bilateral;
pub mod contrast;
pub mod convolution;
pub mod median;

pub use bilateral::BilateralFilter;
pub use contrast::ContrastStretch;
pub use convolution::{GradientField, gaussian_blur, gaussian_kernel, sobel_gradients};
pub use median::AdaptiveMedianFilter;
