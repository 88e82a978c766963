// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image quality assessment.
//
// Raw measurements (noise, skew, outline distortion, contrast, sharpness,
// brightness, resolution) are normalised to 0.0 - 1.0 scores and combined
// into one weighted overall score. The pipeline compares the score before
// and after normalisation and gates geometric correction on it.

use rayon::prelude::*;
use richtwerk_core::config::PipelineConfig;
use richtwerk_core::types::ImageQualityMetrics;
use tracing::{debug, instrument};

use crate::geometry::corners::CornerDetector;
use crate::geometry::interior_angles;
use crate::geometry::skew::estimate_skew;
use crate::raster::{GrayscaleBuffer, RasterBuffer};

const NOISE_WEIGHT: f64 = 0.25;
const SKEW_WEIGHT: f64 = 0.20;
const PERSPECTIVE_WEIGHT: f64 = 0.15;
const CONTRAST_WEIGHT: f64 = 0.15;
const SHARPNESS_WEIGHT: f64 = 0.10;
const BRIGHTNESS_WEIGHT: f64 = 0.10;
const RESOLUTION_WEIGHT: f64 = 0.05;

/// Impulse fraction at which the noise score reaches zero.
const NOISE_CEILING: f64 = 0.05;
/// Skew (degrees) at which the skew score reaches zero.
const SKEW_CEILING: f64 = 15.0;
/// Luma standard deviation treated as full contrast.
const CONTRAST_TARGET: f64 = 64.0;
/// Laplacian variance treated as fully sharp.
const SHARPNESS_TARGET: f64 = 500.0;
/// Ideal mean luma for a scanned page.
const BRIGHTNESS_TARGET: f64 = 180.0;
/// Short side, in pixels, treated as full resolution.
const RESOLUTION_TARGET: f64 = 600.0;

/// Computes `ImageQualityMetrics` for a raster.
#[derive(Debug, Clone)]
pub struct QualityAssessor {
    config: PipelineConfig,
    corners: CornerDetector,
}

impl QualityAssessor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            config: config.clone(),
            corners: CornerDetector::new(&config.corners),
        }
    }

    #[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
    pub fn assess(&self, raster: &RasterBuffer) -> ImageQualityMetrics {
        let gray = raster.to_grayscale();
        let (brightness, contrast) = gray.mean_and_std();
        let sharpness = laplacian_variance(&gray);
        let noise_level = impulse_fraction(&gray, self.config.quality.impulse_deviation);
        let skew_angle = estimate_skew(&gray, self.config.skew.max_angle, self.config.quality.skew_step)
            .unwrap_or(0.0);
        let perspective_distortion = self.perspective_distortion(raster);

        let mut metrics = ImageQualityMetrics {
            width: raster.width(),
            height: raster.height(),
            skew_angle,
            perspective_distortion,
            noise_level,
            sharpness,
            contrast,
            brightness,
            overall: 0.0,
        };
        metrics.overall = overall_score(&metrics);

        debug!(
            noise = metrics.noise_level,
            skew = metrics.skew_angle,
            perspective = metrics.perspective_distortion,
            contrast = metrics.contrast,
            sharpness = metrics.sharpness,
            brightness = metrics.brightness,
            overall = metrics.overall,
            "Quality assessed"
        );
        metrics
    }

    /// Mean deviation of the detected outline's angles from 90 degrees,
    /// scaled so 90 degrees of deviation is 1.0. Zero without an outline.
    fn perspective_distortion(&self, raster: &RasterBuffer) -> f64 {
        match self.corners.detect(raster).corners {
            Some(quad) => {
                let angles = interior_angles(&quad);
                let mean = angles.iter().map(|a| (a - 90.0).abs()).sum::<f64>() / 4.0;
                (mean / 90.0).clamp(0.0, 1.0)
            }
            None => 0.0,
        }
    }
}

/// Weighted combination of the normalised scores, clamped to 0.0 - 1.0.
pub fn overall_score(m: &ImageQualityMetrics) -> f64 {
    let noise = 1.0 - (m.noise_level / NOISE_CEILING).min(1.0);
    let skew = 1.0 - (m.skew_angle.abs() / SKEW_CEILING).min(1.0);
    let perspective = 1.0 - m.perspective_distortion.clamp(0.0, 1.0);
    let contrast = (m.contrast / CONTRAST_TARGET).min(1.0);
    let sharpness = (m.sharpness / SHARPNESS_TARGET).min(1.0);
    let brightness = (1.0 - (m.brightness - BRIGHTNESS_TARGET).abs() / BRIGHTNESS_TARGET).max(0.0);
    let resolution = (m.width.min(m.height) as f64 / RESOLUTION_TARGET).min(1.0);

    let total = NOISE_WEIGHT * noise
        + SKEW_WEIGHT * skew
        + PERSPECTIVE_WEIGHT * perspective
        + CONTRAST_WEIGHT * contrast
        + SHARPNESS_WEIGHT * sharpness
        + BRIGHTNESS_WEIGHT * brightness
        + RESOLUTION_WEIGHT * resolution;
    total.clamp(0.0, 1.0)
}

/// Fraction of interior pixels further than `deviation` from their 3x3 median.
pub fn impulse_fraction(gray: &GrayscaleBuffer, deviation: u8) -> f64 {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w < 3 || h < 3 {
        return 0.0;
    }
    let data = gray.data();
    let impulses: usize = (1..h - 1)
        .into_par_iter()
        .map(|y| {
            let mut window = [0u8; 9];
            let mut count = 0;
            for x in 1..w - 1 {
                let mut k = 0;
                for wy in y - 1..=y + 1 {
                    for wx in x - 1..=x + 1 {
                        window[k] = data[wy * w + wx];
                        k += 1;
                    }
                }
                window.sort_unstable();
                if data[y * w + x].abs_diff(window[4]) > deviation {
                    count += 1;
                }
            }
            count
        })
        .sum();
    impulses as f64 / ((w - 2) * (h - 2)) as f64
}

/// Variance of the 4-neighbour Laplacian over the interior.
pub fn laplacian_variance(gray: &GrayscaleBuffer) -> f64 {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w < 3 || h < 3 {
        return 0.0;
    }
    let data = gray.data();
    let (sum, sum_sq) = (1..h - 1)
        .into_par_iter()
        .map(|y| {
            let (mut s, mut s2) = (0.0f64, 0.0f64);
            for x in 1..w - 1 {
                let i = y * w + x;
                let lap = data[i - 1] as f64 + data[i + 1] as f64 + data[i - w] as f64 + data[i + w] as f64
                    - 4.0 * data[i] as f64;
                s += lap;
                s2 += lap * lap;
            }
            (s, s2)
        })
        .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));
    let n = ((w - 2) * (h - 2)) as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}
