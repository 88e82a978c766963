// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometric analysis and correction: corners, lines, homography, skew.

pub mod corners;
pub mod homography;
pub mod hough;
pub mod skew;

pub use corners::{CornerCandidate, CornerDetection, CornerDetector, DetectionMethod};
pub use homography::{Homography, PerspectiveCorrection, PerspectiveCorrector, homography_from_points};
pub use hough::LineCandidate;
pub use skew::{SkewCorrection, SkewCorrector, otsu_threshold};

use richtwerk_core::types::Point;

/// Area of a simple polygon given in order (clockwise or not).
pub fn shoelace_area(points: &[Point]) -> f64 {
    let n = points.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y;
        area -= points[j].x * points[i].y;
    }
    area.abs() / 2.0
}

/// `(b - a) x (c - b)`.
fn turn(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x)
}

/// Whether the quadrilateral is strictly convex (no collinear triples).
pub fn is_convex_quad(quad: &[Point; 4]) -> bool {
    let turns: Vec<f64> = (0..4)
        .map(|i| turn(quad[i], quad[(i + 1) % 4], quad[(i + 2) % 4]))
        .collect();
    turns.iter().all(|&t| t > 1e-9) || turns.iter().all(|&t| t < -1e-9)
}

/// Interior angles of a convex quadrilateral, in degrees.
pub fn interior_angles(quad: &[Point; 4]) -> [f64; 4] {
    let mut angles = [0.0; 4];
    for (i, angle) in angles.iter_mut().enumerate() {
        let prev = quad[(i + 3) % 4];
        let here = quad[i];
        let next = quad[(i + 1) % 4];
        let (ax, ay) = (prev.x - here.x, prev.y - here.y);
        let (bx, by) = (next.x - here.x, next.y - here.y);
        let norms = (ax.hypot(ay) * bx.hypot(by)).max(f64::EPSILON);
        let cos = ((ax * bx + ay * by) / norms).clamp(-1.0, 1.0);
        *angle = cos.acos().to_degrees();
    }
    angles
}
