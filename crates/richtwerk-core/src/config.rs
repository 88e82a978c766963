// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.
//
// One `PipelineConfig` is constructed per caller (or per worker) and passed
// by reference into every stage. Every section has serde defaults so a JSON
// file only needs to name the values it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, RichtwerkError};
use crate::types::OutputFormat;

/// Complete configuration of the normalisation pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub denoise: DenoiseConfig,
    pub corners: CornerConfig,
    pub skew: SkewConfig,
    pub quality: QualityConfig,
    pub enhance: EnhanceConfig,
    pub limits: LimitsConfig,
    /// Encoding used when results are written out.
    pub output_format: OutputFormat,
}

/// Noise reduction settings (adaptive median + bilateral).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    /// Largest adaptive-median window (odd, >= 3).
    pub median_max_window: usize,
    /// Spatial sigma of the bilateral filter, in pixels.
    pub bilateral_spatial_sigma: f32,
    /// Range sigma of the bilateral filter, in intensity levels.
    pub bilateral_range_sigma: f32,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            median_max_window: 7,
            bilateral_spatial_sigma: 1.0,
            bilateral_range_sigma: 25.0,
        }
    }
}

/// Document corner detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerConfig {
    /// Gaussian pre-blur applied before the gradients.
    pub blur_sigma: f32,
    /// Harris sensitivity `k` in `det(M) - k * trace(M)^2`.
    pub harris_k: f64,
    /// Minimum Harris response for a corner candidate.
    pub harris_threshold: f64,
    /// Radius of the non-maximum suppression window, in pixels.
    pub nms_radius: usize,
    /// Number of strongest candidates considered for the four extremes.
    pub top_candidates: usize,
    /// Lower gradient-magnitude threshold for the edge fallback.
    pub edge_low_threshold: f32,
    /// Upper gradient-magnitude threshold for the edge fallback.
    pub edge_high_threshold: f32,
    /// Hough vote threshold as a fraction of `min(width, height)`.
    pub hough_vote_fraction: f64,
    /// Suppression radius around Hough peaks, in bins.
    pub hough_suppression: usize,
    /// Maximum number of Hough lines kept.
    pub max_lines: usize,
    /// Lines crossing at a shallower angle (degrees) are not intersected.
    pub min_crossing_angle: f64,
    /// Detected quadrilateral must cover at least this fraction of the image.
    pub min_area_fraction: f64,
    /// Gradient magnitude, as a fraction of the strongest, that counts as an
    /// edge under an outline side.
    pub edge_magnitude_fraction: f64,
    /// Fraction of samples along every outline side that must lie on an edge.
    pub edge_support_fraction: f64,
}

impl Default for CornerConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.5,
            harris_k: 0.04,
            harris_threshold: 1000.0,
            nms_radius: 5,
            top_candidates: 20,
            edge_low_threshold: 40.0,
            edge_high_threshold: 100.0,
            hough_vote_fraction: 0.3,
            hough_suppression: 8,
            max_lines: 16,
            min_crossing_angle: 30.0,
            min_area_fraction: 0.10,
            edge_magnitude_fraction: 0.2,
            edge_support_fraction: 0.7,
        }
    }
}

/// Skew estimation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkewConfig {
    /// Search range is `[-max_angle, max_angle]` degrees.
    pub max_angle: f64,
    /// Angular step of the projection-profile search, in degrees.
    pub step: f64,
    /// Angles below this magnitude are treated as "no skew".
    pub min_correction: f64,
}

impl Default for SkewConfig {
    fn default() -> Self {
        Self {
            max_angle: 45.0,
            step: 0.1,
            min_correction: 0.1,
        }
    }
}

/// Quality assessment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Angular step of the (coarser) skew estimate used for scoring.
    pub skew_step: f64,
    /// Deviation from the 3x3 median counted as an impulse.
    pub impulse_deviation: u8,
    /// Geometric correction is skipped below this overall score.
    pub min_quality_for_correction: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            skew_step: 0.5,
            impulse_deviation: 48,
            min_quality_for_correction: 0.15,
        }
    }
}

/// Enhancement settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    /// Run the bilateral filter in the enhancement stage.
    pub bilateral: bool,
    /// Run the percentile contrast stretch.
    pub contrast_stretch: bool,
    /// Lower percentile (0.0 - 1.0) mapped to black.
    pub stretch_low_percentile: f64,
    /// Upper percentile (0.0 - 1.0) mapped to white.
    pub stretch_high_percentile: f64,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            bilateral: true,
            contrast_stretch: true,
            stretch_low_percentile: 0.01,
            stretch_high_percentile: 0.99,
        }
    }
}

/// Resource limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Ceiling on the working memory one document may need, in bytes.
    pub max_buffer_bytes: u64,
    /// Documents processed at the same time by the batch runner.
    pub max_concurrent_documents: usize,
    /// Per-document timeout enforced by the batch runner, in seconds.
    pub document_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_buffer_bytes: 512 * 1024 * 1024,
            max_concurrent_documents: 4,
            document_timeout_secs: 120,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        info!(path = %path.display(), "Pipeline configuration loaded");
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        debug!(path = %path.as_ref().display(), "Pipeline configuration saved");
        Ok(())
    }

    /// Reject values the algorithms cannot work with.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(RichtwerkError::Config(msg.to_string()));

        if self.denoise.median_max_window < 3 {
            return fail("denoise.median_max_window must be at least 3");
        }
        if !(self.denoise.bilateral_spatial_sigma > 0.0) {
            return fail("denoise.bilateral_spatial_sigma must be positive");
        }
        if !(self.denoise.bilateral_range_sigma > 0.0) {
            return fail("denoise.bilateral_range_sigma must be positive");
        }
        if !(self.corners.blur_sigma >= 0.0) {
            return fail("corners.blur_sigma must not be negative");
        }
        if self.corners.top_candidates < 4 {
            return fail("corners.top_candidates must be at least 4");
        }
        if self.corners.edge_low_threshold > self.corners.edge_high_threshold {
            return fail("corners.edge_low_threshold must not exceed edge_high_threshold");
        }
        if !(self.corners.hough_vote_fraction > 0.0 && self.corners.hough_vote_fraction <= 1.0) {
            return fail("corners.hough_vote_fraction must be in (0, 1]");
        }
        if !(self.corners.min_area_fraction >= 0.0 && self.corners.min_area_fraction < 1.0) {
            return fail("corners.min_area_fraction must be in [0, 1)");
        }
        if !(self.corners.edge_magnitude_fraction > 0.0 && self.corners.edge_magnitude_fraction <= 1.0) {
            return fail("corners.edge_magnitude_fraction must be in (0, 1]");
        }
        if !(self.corners.edge_support_fraction > 0.0 && self.corners.edge_support_fraction <= 1.0) {
            return fail("corners.edge_support_fraction must be in (0, 1]");
        }
        if !(self.skew.max_angle > 0.0 && self.skew.max_angle <= 90.0) {
            return fail("skew.max_angle must be in (0, 90]");
        }
        if !(self.skew.step > 0.0) || !(self.quality.skew_step > 0.0) {
            return fail("skew steps must be positive");
        }
        if !(0.0..=1.0).contains(&self.quality.min_quality_for_correction) {
            return fail("quality.min_quality_for_correction must be in [0, 1]");
        }
        let enhance = &self.enhance;
        if !(0.0..1.0).contains(&enhance.stretch_low_percentile)
            || !(0.0..=1.0).contains(&enhance.stretch_high_percentile)
            || enhance.stretch_low_percentile >= enhance.stretch_high_percentile
        {
            return fail("enhance stretch percentiles must satisfy 0 <= low < high <= 1");
        }
        if self.limits.max_concurrent_documents == 0 {
            return fail("limits.max_concurrent_documents must be at least 1");
        }
        if self.limits.document_timeout_secs == 0 {
            return fail("limits.document_timeout_secs must be at least 1");
        }
        Ok(())
    }
}
