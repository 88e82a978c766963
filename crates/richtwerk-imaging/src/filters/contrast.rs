// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Percentile contrast stretch.

use tracing::{debug, instrument};

use crate::raster::RasterBuffer;

/// Spans narrower than this many levels are left alone.
const MIN_SPAN: u8 = 8;

/// Linear stretch mapping luminance percentiles to black and white.
#[derive(Debug, Clone, Copy)]
pub struct ContrastStretch {
    low_percentile: f64,
    high_percentile: f64,
}

impl Default for ContrastStretch {
    fn default() -> Self {
        Self::new(0.01, 0.99)
    }
}

impl ContrastStretch {
    pub fn new(low_percentile: f64, high_percentile: f64) -> Self {
        Self {
            low_percentile: low_percentile.clamp(0.0, 1.0),
            high_percentile: high_percentile.clamp(0.0, 1.0),
        }
    }

    /// Luminance levels at the low and high percentiles.
    pub fn levels(&self, raster: &RasterBuffer) -> (u8, u8) {
        let histogram = raster.to_grayscale().histogram();
        let total: u64 = histogram.iter().sum();
        (
            percentile_level(&histogram, total, self.low_percentile),
            percentile_level(&histogram, total, self.high_percentile),
        )
    }

    #[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
    pub fn apply(&self, raster: &RasterBuffer) -> RasterBuffer {
        let (low, high) = self.levels(raster);
        if high <= low || high - low < MIN_SPAN {
            debug!(low, high, "Contrast span too narrow; unchanged");
            return raster.clone();
        }

        let scale = 255.0 / (high - low) as f32;
        let mut lut = [0u8; 256];
        for (v, out) in lut.iter_mut().enumerate() {
            let stretched = (v as f32 - low as f32) * scale;
            *out = stretched.round().clamp(0.0, 255.0) as u8;
        }

        let channels = raster.channels();
        let mut data = raster.data().to_vec();
        for px in data.chunks_exact_mut(channels) {
            for sample in px.iter_mut().take(3) {
                *sample = lut[*sample as usize];
            }
        }

        debug!(low, high, "Contrast stretched");
        raster.with_data(data)
    }
}

/// Smallest level whose cumulative count reaches `fraction` of `total`.
fn percentile_level(histogram: &[u64; 256], total: u64, fraction: f64) -> u8 {
    let target = (fraction * total as f64).ceil().max(1.0) as u64;
    let mut cumulative = 0u64;
    for (level, &count) in histogram.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return level as u8;
        }
    }
    255
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(low: u8, high: u8) -> RasterBuffer {
        let mut data = Vec::new();
        for v in low..=high {
            data.extend_from_slice(&[v, v, v]);
        }
        let w = (high - low) as u32 + 1;
        RasterBuffer::new(w, 1, 3, data).expect("raster")
    }

    #[test]
    fn stretches_to_full_range() {
        let raster = ramp(60, 160);
        let out = ContrastStretch::new(0.0, 1.0).apply(&raster);
        assert_eq!(out.data()[0], 0);
        assert_eq!(out.data()[out.data().len() - 1], 255);
    }

    #[test]
    fn narrow_span_is_unchanged() {
        let raster = ramp(100, 104);
        assert_eq!(ContrastStretch::default().apply(&raster), raster);
    }

    #[test]
    fn alpha_is_preserved() {
        let data = vec![50, 50, 50, 7, 200, 200, 200, 9];
        let raster = RasterBuffer::new(2, 1, 4, data).expect("raster");
        let out = ContrastStretch::new(0.0, 1.0).apply(&raster);
        assert_eq!(out.data(), &[0, 0, 0, 7, 255, 255, 255, 9]);
    }
}
