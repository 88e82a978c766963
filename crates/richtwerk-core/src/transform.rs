// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometric transformations applied to a document, and the ordered chain that
// lets downstream consumers map corrected-image coordinates back to the
// original capture.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::types::Point;

/// Homogeneous coordinates with |w| below this are treated as points at infinity.
const W_EPS: f64 = 1e-12;

/// The correction that produced a transformation, with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformKind {
    /// Quadrilateral → rectangle mapping. Corners are TL, TR, BR, BL.
    Perspective { source_corners: [Point; 4] },
    /// Pure translation.
    Affine { translation: Point },
    /// Rotation about `center` by `angle_degrees` (positive = clockwise on screen).
    Rotation { angle_degrees: f64, center: Point },
    /// Uniform scaling about the origin.
    Scaling { factor: f64 },
}

/// One transformation applied to the raster, original → corrected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometricTransformation {
    pub kind: TransformKind,
    /// Row-major 3x3 homogeneous matrix.
    pub matrix: [[f64; 3]; 3],
    /// Confidence of the estimate that produced this transformation, 0.0 - 1.0.
    pub confidence: f64,
}

impl GeometricTransformation {
    /// Build a transformation from an nalgebra matrix.
    pub fn from_matrix(kind: TransformKind, matrix: &Matrix3<f64>, confidence: f64) -> Self {
        let mut rows = [[0.0; 3]; 3];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = matrix[(r, c)];
            }
        }
        Self {
            kind,
            matrix: rows,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// A perspective record that leaves every point where it is.
    ///
    /// Used when too few boundary features were found to correct anything.
    pub fn identity_perspective() -> Self {
        Self::from_matrix(
            TransformKind::Perspective {
                source_corners: [Point::default(); 4],
            },
            &Matrix3::identity(),
            0.0,
        )
    }

    /// Rotation by `angle_degrees` about `center`.
    ///
    /// Positive angles turn the content clockwise on screen (y points down).
    pub fn rotation(angle_degrees: f64, center: Point, confidence: f64) -> Self {
        let (s, c) = angle_degrees.to_radians().sin_cos();
        let to_origin = Matrix3::new(1.0, 0.0, -center.x, 0.0, 1.0, -center.y, 0.0, 0.0, 1.0);
        let rotate = Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0);
        let back = Matrix3::new(1.0, 0.0, center.x, 0.0, 1.0, center.y, 0.0, 0.0, 1.0);
        Self::from_matrix(
            TransformKind::Rotation {
                angle_degrees,
                center,
            },
            &(back * rotate * to_origin),
            confidence,
        )
    }

    /// Uniform scaling about the origin.
    pub fn scaling(factor: f64, confidence: f64) -> Self {
        let m = Matrix3::new(factor, 0.0, 0.0, 0.0, factor, 0.0, 0.0, 0.0, 1.0);
        Self::from_matrix(TransformKind::Scaling { factor }, &m, confidence)
    }

    /// Translation by `(dx, dy)`.
    pub fn translation(dx: f64, dy: f64, confidence: f64) -> Self {
        let m = Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0);
        Self::from_matrix(
            TransformKind::Affine {
                translation: Point::new(dx, dy),
            },
            &m,
            confidence,
        )
    }

    /// The matrix as an nalgebra value.
    pub fn to_matrix3(&self) -> Matrix3<f64> {
        let m = &self.matrix;
        Matrix3::new(
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        )
    }

    pub fn is_identity(&self) -> bool {
        (self.to_matrix3() - Matrix3::identity()).abs().max() < 1e-12
    }

    /// Map a point from original to corrected coordinates.
    ///
    /// Returns `None` for points the projection sends to infinity.
    pub fn map_point(&self, p: Point) -> Option<Point> {
        project(&self.to_matrix3(), p)
    }

    /// Map a point from corrected back to original coordinates.
    pub fn unmap_point(&self, p: Point) -> Option<Point> {
        let inverse = self.to_matrix3().try_inverse()?;
        project(&inverse, p)
    }
}

/// Apply a homogeneous 3x3 matrix to a point.
pub fn project(m: &Matrix3<f64>, p: Point) -> Option<Point> {
    let v = m * Vector3::new(p.x, p.y, 1.0);
    let w = v[2];
    if !w.is_finite() || w.abs() <= W_EPS || !v[0].is_finite() || !v[1].is_finite() {
        return None;
    }
    Some(Point::new(v[0] / w, v[1] / w))
}

/// Ordered list of the transformations applied to a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformChain {
    steps: Vec<GeometricTransformation>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transformation applied after all existing ones.
    pub fn push(&mut self, step: GeometricTransformation) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[GeometricTransformation] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Single matrix equivalent to applying every step in order.
    pub fn composed(&self) -> Matrix3<f64> {
        self.steps
            .iter()
            .fold(Matrix3::identity(), |acc, step| step.to_matrix3() * acc)
    }

    /// Map an original-capture point into corrected-image space.
    pub fn map_point(&self, p: Point) -> Option<Point> {
        self.steps.iter().try_fold(p, |acc, step| step.map_point(acc))
    }

    /// Map a corrected-image point back into the original capture.
    pub fn unmap_point(&self, p: Point) -> Option<Point> {
        self.steps
            .iter()
            .rev()
            .try_fold(p, |acc, step| step.unmap_point(acc))
    }
}
