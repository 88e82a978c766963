// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective correction: four-point homography and the warp that applies it.

use nalgebra::{Matrix3, SMatrix, SVector};
use richtwerk_core::error::Result;
use richtwerk_core::transform::{GeometricTransformation, TransformKind, project};
use richtwerk_core::types::Point;
use tracing::{debug, info, instrument, warn};

use crate::codec::{RasterCodec, WHITE};
use crate::geometry::corners::CornerDetection;
use crate::geometry::is_convex_quad;
use crate::raster::RasterBuffer;

/// Projective 3x3 matrix, original → corrected coordinates.
pub type Homography = Matrix3<f64>;

/// Largest corner reprojection error accepted for an estimate, in pixels.
const MAX_REPROJECTION_ERROR: f64 = 1e-3;

/// Solve the homography sending `src[i]` to `dst[i]`.
///
/// Sets up the standard 8x8 system with `h33 = 1` and solves it by LU
/// decomposition. Returns `None` for degenerate point sets.
pub fn homography_from_points(src: &[Point; 4], dst: &[Point; 4]) -> Option<Homography> {
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for i in 0..4 {
        let (s, d) = (src[i], dst[i]);
        let r = 2 * i;
        a.set_row(
            r,
            &SMatrix::<f64, 1, 8>::from_row_slice(&[s.x, s.y, 1.0, 0.0, 0.0, 0.0, -s.x * d.x, -s.y * d.x]),
        );
        b[r] = d.x;
        a.set_row(
            r + 1,
            &SMatrix::<f64, 1, 8>::from_row_slice(&[0.0, 0.0, 0.0, s.x, s.y, 1.0, -s.x * d.y, -s.y * d.y]),
        );
        b[r + 1] = d.y;
    }

    let h = a.lu().solve(&b)?;
    if h.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0))
}

/// Outcome of a perspective correction attempt.
#[derive(Debug, Clone)]
pub struct PerspectiveCorrection {
    pub raster: RasterBuffer,
    pub transformation: GeometricTransformation,
    /// Whether the raster was actually warped.
    pub applied: bool,
}

/// Maps a detected document quadrilateral onto the full image rectangle.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerspectiveCorrector;

impl PerspectiveCorrector {
    pub fn new() -> Self {
        Self
    }

    /// Homography sending `[TL, TR, BR, BL]` to the corners of a
    /// `width` x `height` rectangle.
    ///
    /// Returns `None` unless the matrix is invertible and reproduces every
    /// corner to within a thousandth of a pixel.
    pub fn estimate(corners: &[Point; 4], width: u32, height: u32) -> Option<Homography> {
        if !is_convex_quad(corners) {
            return None;
        }
        let (w, h) = (width as f64, height as f64);
        let target = [
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ];
        let matrix = homography_from_points(corners, &target)?;
        matrix.try_inverse()?;

        for (src, dst) in corners.iter().zip(target.iter()) {
            let mapped = project(&matrix, *src)?;
            if mapped.distance_to(dst) > MAX_REPROJECTION_ERROR {
                debug!(?src, ?mapped, "Homography fails reprojection check");
                return None;
            }
        }
        Some(matrix)
    }

    /// Warp `raster` so the detected quadrilateral fills the whole frame.
    ///
    /// Without usable corners the raster is returned unchanged together with
    /// an identity transformation of confidence 0.
    #[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
    pub fn correct(
        &self,
        raster: &RasterBuffer,
        detection: &CornerDetection,
        codec: &dyn RasterCodec,
    ) -> Result<PerspectiveCorrection> {
        let unchanged = || PerspectiveCorrection {
            raster: raster.clone(),
            transformation: GeometricTransformation::identity_perspective(),
            applied: false,
        };

        let Some(corners) = detection.corners else {
            debug!("No document corners; perspective unchanged");
            return Ok(unchanged());
        };

        let (w, h) = (raster.width(), raster.height());
        let Some(matrix) = Self::estimate(&corners, w, h) else {
            warn!("Homography estimate rejected; perspective unchanged");
            return Ok(unchanged());
        };

        let transformation = GeometricTransformation::from_matrix(
            TransformKind::Perspective {
                source_corners: corners,
            },
            &matrix,
            detection.confidence,
        );
        if transformation.is_identity() {
            // Corners already sit on the frame.
            return Ok(PerspectiveCorrection {
                raster: raster.clone(),
                transformation,
                applied: false,
            });
        }

        let warped = codec.warp(raster, &matrix, w, h, WHITE)?;
        info!(confidence = detection.confidence, "Perspective correction applied");
        Ok(PerspectiveCorrection {
            raster: warped,
            transformation,
            applied: true,
        })
    }
}
