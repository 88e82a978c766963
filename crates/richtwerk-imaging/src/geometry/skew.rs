// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Skew estimation and correction.
//
// The page is binarised with Otsu's threshold and the dark pixels are
// projected onto the normal of a candidate baseline. When the candidate angle
// matches the text lines the profile turns into sharp peaks and gaps, which
// maximises its variance.

use rayon::prelude::*;
use richtwerk_core::config::SkewConfig;
use richtwerk_core::error::Result;
use richtwerk_core::transform::GeometricTransformation;
use richtwerk_core::types::Point;
use tracing::{debug, info, instrument};

use crate::codec::{RasterCodec, WHITE};
use crate::raster::{GrayscaleBuffer, RasterBuffer};

/// Otsu threshold over 256 levels.
///
/// Maximises `wB * wF * (mB - mF)^2`. A plateau of equal maxima resolves to
/// its midpoint. Returns `None` for a histogram with a single occupied level.
pub fn otsu_threshold(histogram: &[u64; 256]) -> Option<u8> {
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return None;
    }
    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut sum_background = 0.0;
    let mut weight_background = 0u64;
    let mut max_variance = 0.0f64;
    let mut plateau: Option<(usize, usize)> = None;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;
        let between = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if between > max_variance {
            max_variance = between;
            plateau = Some((t, t));
        } else if between == max_variance {
            if let Some((_, end)) = plateau.as_mut() {
                *end = t;
            }
        }
    }

    plateau
        .filter(|_| max_variance > 0.0)
        .map(|(start, end)| ((start + end) / 2) as u8)
}

/// Coordinates of pixels at or below `threshold`.
fn dark_pixels(gray: &GrayscaleBuffer, threshold: u8) -> Vec<(f32, f32)> {
    let w = gray.width() as usize;
    gray.data()
        .iter()
        .enumerate()
        .filter(|(_, v)| **v <= threshold)
        .map(|(i, _)| ((i % w) as f32, (i / w) as f32))
        .collect()
}

/// Variance of the projection profile of `points` at `angle_degrees`.
fn profile_variance(points: &[(f32, f32)], angle_degrees: f64, diagonal: usize) -> f64 {
    let bins = 2 * diagonal + 1;
    let mut profile = vec![0u32; bins];
    let (s, c) = angle_degrees.to_radians().sin_cos();
    let (s, c) = (s as f32, c as f32);
    for &(x, y) in points {
        let coord = (-x * s + y * c).round() as isize + diagonal as isize;
        profile[coord.clamp(0, bins as isize - 1) as usize] += 1;
    }

    let n = bins as f64;
    let mean = points.len() as f64 / n;
    let sum_sq: f64 = profile.iter().map(|&v| (v as f64) * (v as f64)).sum();
    sum_sq / n - mean * mean
}

/// Dominant text-line angle in degrees (positive = descending to the right).
///
/// Searches `[-max_angle, max_angle]` in steps of `step`. Returns `None`
/// when the image cannot be binarised or the search range is empty.
pub fn estimate_skew(gray: &GrayscaleBuffer, max_angle: f64, step: f64) -> Option<f64> {
    if !(step > 0.0 && max_angle >= 0.0 && (max_angle / step).is_finite()) {
        return None;
    }
    let threshold = otsu_threshold(&gray.histogram())?;
    let points = dark_pixels(gray, threshold);
    if points.is_empty() {
        return None;
    }

    let (w, h) = (gray.width() as f64, gray.height() as f64);
    let diagonal = (w * w + h * h).sqrt().ceil() as usize;
    let steps = (2.0 * max_angle / step).round() as i64;

    let scored: Vec<(f64, f64)> = (0..=steps)
        .into_par_iter()
        .map(|i| {
            let angle = -max_angle + i as f64 * step;
            (angle, profile_variance(&points, angle, diagonal))
        })
        .collect();

    let (angle, score) = scored.into_iter().fold((0.0f64, f64::MIN), |best, candidate| {
        let better = candidate.1 > best.1
            || (candidate.1 == best.1 && candidate.0.abs() < best.0.abs());
        if better { candidate } else { best }
    });

    debug!(threshold, points = points.len(), angle, score, "Skew estimated");
    if score > 0.0 { Some(angle) } else { None }
}

/// Outcome of a skew correction.
#[derive(Debug, Clone)]
pub struct SkewCorrection {
    pub raster: RasterBuffer,
    /// Estimated skew before correction, 0 when none was found.
    pub angle_degrees: f64,
    pub confidence: f64,
    /// The rotation applied, if any.
    pub transformation: Option<GeometricTransformation>,
}

/// Estimates and removes page skew.
#[derive(Debug, Clone)]
pub struct SkewCorrector {
    config: SkewConfig,
}

impl SkewCorrector {
    pub fn new(config: &SkewConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn estimate(&self, gray: &GrayscaleBuffer) -> Option<f64> {
        estimate_skew(gray, self.config.max_angle, self.config.step)
    }

    /// Rotate the raster so the text lines are horizontal.
    #[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
    pub fn correct(&self, raster: &RasterBuffer, codec: &dyn RasterCodec) -> Result<SkewCorrection> {
        let Some(angle) = self.estimate(&raster.to_grayscale()) else {
            debug!("No skew estimate; raster unchanged");
            return Ok(SkewCorrection {
                raster: raster.clone(),
                angle_degrees: 0.0,
                confidence: 0.0,
                transformation: None,
            });
        };

        if angle.abs() < self.config.min_correction {
            debug!(angle, "Skew below correction threshold");
            return Ok(SkewCorrection {
                raster: raster.clone(),
                angle_degrees: angle,
                confidence: 1.0,
                transformation: None,
            });
        }

        let confidence = (1.0 - angle.abs() / 45.0).clamp(0.0, 1.0);
        let rotated = codec.rotate(raster, -angle, WHITE)?;
        let center = Point::new(raster.width() as f64 / 2.0, raster.height() as f64 / 2.0);
        info!(angle, confidence, "Skew corrected");

        Ok(SkewCorrection {
            raster: rotated,
            angle_degrees: angle,
            confidence,
            transformation: Some(GeometricTransformation::rotation(-angle, center, confidence)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ImageCodec;

    /// White page with thick dark lines descending to the right at `angle`.
    fn ruled_page(angle: f64) -> RasterBuffer {
        let (w, h) = (400u32, 300u32);
        let mut data = vec![255u8; (w * h * 3) as usize];
        let slope = angle.to_radians().tan();
        for line in 0..7 {
            let y0 = 60.0 + 30.0 * line as f64;
            for x in 40..360u32 {
                let centre = y0 + (x as f64 - 200.0) * slope;
                for t in 0..3 {
                    let y = (centre + t as f64 - 1.0).round();
                    if y >= 0.0 && y < h as f64 {
                        let i = ((y as u32 * w + x) * 3) as usize;
                        data[i..i + 3].copy_from_slice(&[20, 20, 20]);
                    }
                }
            }
        }
        RasterBuffer::new(w, h, 3, data).expect("raster")
    }

    #[test]
    fn otsu_lands_between_modes() {
        let mut histogram = [0u64; 256];
        histogram[40] = 500;
        histogram[45] = 300;
        histogram[200] = 700;
        histogram[210] = 200;
        let t = otsu_threshold(&histogram).expect("threshold");
        assert!(t > 45 && t < 200, "{t}");
    }

    #[test]
    fn otsu_single_level_is_degenerate() {
        let mut histogram = [0u64; 256];
        histogram[128] = 1000;
        assert_eq!(otsu_threshold(&histogram), None);
        assert_eq!(otsu_threshold(&[0u64; 256]), None);
    }

    /// Rows rotated by 7.3 degrees are recovered, and the corrected page
    /// re-estimates close to level.
    #[test]
    fn recovers_and_removes_skew() {
        let raster = ruled_page(7.3);
        let corrector = SkewCorrector::new(&SkewConfig::default());

        let estimate = corrector.estimate(&raster.to_grayscale()).expect("estimate");
        assert!((estimate - 7.3).abs() <= 0.2, "estimated {estimate}");

        let corrected = corrector.correct(&raster, &ImageCodec::new()).expect("correct");
        assert!(corrected.transformation.is_some());
        assert!((corrected.confidence - (1.0 - corrected.angle_degrees.abs() / 45.0)).abs() < 1e-12);

        let residual = corrector
            .estimate(&corrected.raster.to_grayscale())
            .expect("residual estimate");
        assert!(residual.abs() <= 0.3, "residual {residual}");
    }

    #[test]
    fn level_page_is_left_alone() {
        let raster = ruled_page(0.0);
        let corrected = SkewCorrector::new(&SkewConfig::default())
            .correct(&raster, &ImageCodec::new())
            .expect("correct");
        assert_eq!(corrected.confidence, 1.0);
        assert!(corrected.transformation.is_none());
        assert_eq!(corrected.raster, raster);
    }

    #[test]
    fn blank_page_has_no_estimate() {
        let raster = RasterBuffer::filled(64, 48, [255, 255, 255]).expect("raster");
        let corrected = SkewCorrector::new(&SkewConfig::default())
            .correct(&raster, &ImageCodec::new())
            .expect("correct");
        assert_eq!(corrected.confidence, 0.0);
        assert!(corrected.transformation.is_none());
        assert_eq!(corrected.raster, raster);
    }

    #[test]
    fn empty_search_range_has_no_estimate() {
        let gray = ruled_page(3.0).to_grayscale();
        assert!(estimate_skew(&gray, 10.0, 0.0).is_none());
        assert!(estimate_skew(&gray, 10.0, -0.5).is_none());
        assert!(estimate_skew(&gray, 10.0, f64::NAN).is_none());
        assert!(estimate_skew(&gray, 10.0, 0.5).is_some());
    }
}
