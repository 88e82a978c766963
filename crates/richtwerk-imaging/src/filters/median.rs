// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Adaptive median filter for salt-and-pepper noise.
//
// The window grows from 3x3 until its median is not itself an extreme. A
// pixel is replaced only if it is an extreme of that window, so edges and
// fine strokes survive where a fixed-size median would erode them.

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::raster::RasterBuffer;

/// Per-channel adaptive median filter. Alpha is copied through.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveMedianFilter {
    max_window: usize,
}

impl Default for AdaptiveMedianFilter {
    fn default() -> Self {
        Self::new(7)
    }
}

impl AdaptiveMedianFilter {
    /// `max_window` is rounded down to an odd size and raised to at least 3.
    pub fn new(max_window: usize) -> Self {
        let odd = if max_window % 2 == 0 {
            max_window.saturating_sub(1)
        } else {
            max_window
        };
        Self {
            max_window: odd.max(3),
        }
    }

    pub fn max_window(&self) -> usize {
        self.max_window
    }

    #[instrument(skip_all, fields(width = raster.width(), height = raster.height(), max_window = self.max_window))]
    pub fn apply(&self, raster: &RasterBuffer) -> RasterBuffer {
        let channels = raster.channels();
        let stride = raster.stride();
        let max_len = self.max_window * self.max_window;

        let mut out = raster.data().to_vec();
        out.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
            let mut window = Vec::with_capacity(max_len);
            for x in 0..raster.width() as usize {
                for c in 0..channels.min(3) {
                    row[x * channels + c] = self.filter_sample(raster, x as isize, y as isize, c, &mut window);
                }
            }
        });

        debug!("Adaptive median applied");
        raster.with_data(out)
    }

    fn filter_sample(&self, raster: &RasterBuffer, x: isize, y: isize, c: usize, window: &mut Vec<u8>) -> u8 {
        let centre = raster.sample_clamped(x, y, c);
        let mut size = 3;
        let mut median = centre;

        while size <= self.max_window {
            let r = (size / 2) as isize;
            window.clear();
            for dy in -r..=r {
                for dx in -r..=r {
                    window.push(raster.sample_clamped(x + dx, y + dy, c));
                }
            }
            window.sort_unstable();
            let min = window[0];
            let max = window[window.len() - 1];
            median = window[window.len() / 2];

            if min < median && median < max {
                return if min < centre && centre < max { centre } else { median };
            }
            size += 2;
        }

        // Exhausted: median of the largest window.
        median
    }
}
