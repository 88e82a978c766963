// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structural analysis of the corrected page.
//
// Layout and table recognition are downstream concerns reached through the
// `StructuralAnalyzer` trait. `LineBandAnalyzer` is the built-in analyser: it
// reports horizontal bands of text so the pipeline can run end to end.

use std::sync::Arc;

use richtwerk_core::types::{BoundingBox, Region, RegionKind, StructuralAnalysis};
use tracing::debug;

use crate::geometry::skew::otsu_threshold;
use crate::raster::RasterBuffer;

/// Finds regions on a corrected raster.
pub trait StructuralAnalyzer: Send + Sync {
    fn analyze(&self, raster: &RasterBuffer) -> StructuralAnalysis;
}

impl<T: StructuralAnalyzer + ?Sized> StructuralAnalyzer for Arc<T> {
    fn analyze(&self, raster: &RasterBuffer) -> StructuralAnalysis {
        (**self).analyze(raster)
    }
}

/// Reports contiguous runs of inked rows as text bands.
#[derive(Debug, Clone, Copy)]
pub struct LineBandAnalyzer {
    /// A row is inked when more than this fraction of its pixels is dark.
    pub row_fraction: f64,
    /// Bands thinner than this many rows are dropped.
    pub min_height: u32,
}

impl Default for LineBandAnalyzer {
    fn default() -> Self {
        Self {
            row_fraction: 0.01,
            min_height: 2,
        }
    }
}

impl StructuralAnalyzer for LineBandAnalyzer {
    fn analyze(&self, raster: &RasterBuffer) -> StructuralAnalysis {
        let gray = raster.to_grayscale();
        let Some(threshold) = otsu_threshold(&gray.histogram()) else {
            return StructuralAnalysis::default();
        };

        let (w, h) = (gray.width() as usize, gray.height() as usize);
        let data = gray.data();
        let min_count = self.row_fraction * w as f64;
        let inked: Vec<bool> = data
            .chunks_exact(w)
            .map(|row| row.iter().filter(|&&v| v <= threshold).count() as f64 > min_count)
            .collect();

        let mut regions = Vec::new();
        let mut y = 0;
        while y < h {
            if !inked[y] {
                y += 1;
                continue;
            }
            let start = y;
            while y < h && inked[y] {
                y += 1;
            }
            let rows = start..y;
            if (rows.len() as u32) < self.min_height {
                continue;
            }

            // Trim horizontally to the dark extent of the band.
            let mut left = w;
            let mut right = 0;
            for row in rows.clone() {
                let line = &data[row * w..(row + 1) * w];
                if let Some(first) = line.iter().position(|&v| v <= threshold) {
                    left = left.min(first);
                }
                if let Some(last) = line.iter().rposition(|&v| v <= threshold) {
                    right = right.max(last);
                }
            }
            if left > right {
                continue;
            }

            let bbox = BoundingBox {
                x: left as u32,
                y: start as u32,
                width: (right - left + 1) as u32,
                height: rows.len() as u32,
            };
            let inked_pixels = rows
                .map(|row| data[row * w + left..=row * w + right].iter().filter(|&&v| v <= threshold).count())
                .sum::<usize>();
            let density = inked_pixels as f64 / bbox.area() as f64;

            regions.push(Region {
                kind: RegionKind::TextBand,
                bbox,
                confidence: density.clamp(0.0, 1.0),
            });
        }

        debug!(bands = regions.len(), threshold, "Line bands found");
        StructuralAnalysis {
            regions,
            tables: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_two_bands() {
        let (w, h) = (100u32, 60u32);
        let mut data = vec![255u8; (w * h * 3) as usize];
        for (y0, y1, x0, x1) in [(10u32, 14u32, 20u32, 80u32), (30, 33, 5, 95)] {
            for y in y0..y1 {
                for x in x0..x1 {
                    let i = ((y * w + x) * 3) as usize;
                    data[i..i + 3].copy_from_slice(&[0, 0, 0]);
                }
            }
        }
        let raster = RasterBuffer::new(w, h, 3, data).expect("raster");
        let analysis = LineBandAnalyzer::default().analyze(&raster);

        assert_eq!(analysis.regions.len(), 2);
        assert!(analysis.tables.is_empty());
        let first = analysis.regions[0].bbox;
        assert_eq!((first.x, first.y, first.width, first.height), (20, 10, 60, 4));
        let second = analysis.regions[1].bbox;
        assert_eq!((second.x, second.y, second.width, second.height), (5, 30, 90, 3));
        assert!((analysis.regions[0].confidence - 1.0).abs() < 1e-12);
    }

    /// Confidence is the inked share of the band's bounding box.
    #[test]
    fn band_confidence_is_ink_density() {
        let (w, h) = (100u32, 30u32);
        let mut data = vec![255u8; (w * h * 3) as usize];
        for y in 10..14u32 {
            let x1 = if y < 12 { 80 } else { 50 };
            for x in 20..x1 {
                let i = ((y * w + x) * 3) as usize;
                data[i..i + 3].copy_from_slice(&[0, 0, 0]);
            }
        }
        let raster = RasterBuffer::new(w, h, 3, data).expect("raster");
        let analysis = LineBandAnalyzer::default().analyze(&raster);

        assert_eq!(analysis.regions.len(), 1);
        let band = &analysis.regions[0];
        assert_eq!(band.bbox.area(), 240);
        assert!((band.confidence - 0.75).abs() < 1e-12);
    }

    /// Single-row specks are not bands.
    #[test]
    fn thin_runs_are_dropped() {
        let (w, h) = (50u32, 20u32);
        let mut data = vec![255u8; (w * h * 3) as usize];
        for x in 0..50u32 {
            let i = ((7 * w + x) * 3) as usize;
            data[i..i + 3].copy_from_slice(&[0, 0, 0]);
        }
        let raster = RasterBuffer::new(w, h, 3, data).expect("raster");
        assert!(LineBandAnalyzer::default().analyze(&raster).regions.is_empty());
    }

    #[test]
    fn blank_page_has_no_regions() {
        let raster = RasterBuffer::filled(30, 30, [255, 255, 255]).expect("raster");
        assert_eq!(LineBandAnalyzer::default().analyze(&raster), StructuralAnalysis::default());
    }
}
