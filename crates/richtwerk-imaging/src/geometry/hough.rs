// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edge/line fallback for document corner detection.
//
// Gradient magnitudes are thinned along the gradient direction, linked by
// hysteresis and voted into a dense (theta, rho) accumulator. Strong lines
// are intersected pairwise; the crossings become corner candidates.

use std::collections::VecDeque;

use richtwerk_core::config::CornerConfig;
use richtwerk_core::types::Point;
use serde::Serialize;
use tracing::debug;

use crate::filters::convolution::GradientField;
use crate::geometry::corners::CornerCandidate;

const THETA_BINS: usize = 180;
const TAN_22_5_DEG: f32 = 0.414_213_57;
/// Below this |det| two lines are treated as parallel.
const PARALLEL_EPS: f64 = 1e-6;

/// A straight line in polar form `x cos(theta) + y sin(theta) = rho`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineCandidate {
    pub rho: f64,
    pub theta_degrees: f64,
    pub votes: u32,
    /// Two points on the line, one image diagonal either side of the foot point.
    pub endpoints: (Point, Point),
}

impl LineCandidate {
    pub fn new(rho: f64, theta_degrees: f64, votes: u32, diagonal: f64) -> Self {
        let (s, c) = theta_degrees.to_radians().sin_cos();
        let foot = Point::new(rho * c, rho * s);
        let endpoints = (
            Point::new(foot.x + diagonal * s, foot.y - diagonal * c),
            Point::new(foot.x - diagonal * s, foot.y + diagonal * c),
        );
        Self {
            rho,
            theta_degrees,
            votes,
            endpoints,
        }
    }
}

/// Lines and their crossings found by the fallback.
#[derive(Debug, Clone, Default)]
pub struct LineAnalysis {
    pub lines: Vec<LineCandidate>,
    pub candidates: Vec<CornerCandidate>,
}

/// Run the whole fallback on a gradient field.
pub fn detect_line_corners(field: &GradientField, config: &CornerConfig) -> LineAnalysis {
    let edges = hysteresis_edges(field, config.edge_low_threshold, config.edge_high_threshold);
    let edge_count = edges.iter().filter(|&&e| e).count();

    let min_side = field.width.min(field.height) as f64;
    let vote_threshold = (config.hough_vote_fraction * min_side).ceil().max(1.0) as u32;
    let accumulator = HoughAccumulator::from_edges(&edges, field.width, field.height);
    let lines = accumulator.peaks(vote_threshold, config.hough_suppression, config.max_lines);

    let candidates = intersect_lines(
        &lines,
        field.width as f64,
        field.height as f64,
        config.min_crossing_angle,
    );
    debug!(
        edge_count,
        vote_threshold,
        lines = lines.len(),
        crossings = candidates.len(),
        "Hough fallback finished"
    );
    LineAnalysis { lines, candidates }
}

/// Thin edges along the gradient direction, then keep weak edges only if
/// they are 8-connected to a strong one.
pub fn hysteresis_edges(field: &GradientField, low: f32, high: f32) -> Vec<bool> {
    let (w, h) = (field.width, field.height);
    let mut thin = vec![false; w * h];
    if w < 3 || h < 3 {
        return thin;
    }

    let mag = &field.magnitude;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let m = mag[i];
            if m < low {
                continue;
            }
            let (gx, gy) = (field.dx[i], field.dy[i]);
            let (ax, ay) = (gx.abs(), gy.abs());
            let same_sign = (gx >= 0.0) == (gy >= 0.0);
            let (n1, n2) = if ay <= ax * TAN_22_5_DEG {
                (mag[i - 1], mag[i + 1])
            } else if ax <= ay * TAN_22_5_DEG {
                (mag[i - w], mag[i + w])
            } else if same_sign {
                (mag[i - w - 1], mag[i + w + 1])
            } else {
                (mag[i - w + 1], mag[i + w - 1])
            };
            // Ties on plateaus keep the first pixel in scan order.
            thin[i] = m > n1 && m >= n2;
        }
    }

    let mut edges = vec![false; w * h];
    let mut queue = VecDeque::new();
    for i in 0..w * h {
        if thin[i] && mag[i] >= high {
            edges[i] = true;
            queue.push_back(i);
        }
    }
    while let Some(i) = queue.pop_front() {
        let (x, y) = ((i % w) as isize, (i / w) as isize);
        for dy in -1..=1isize {
            for dx in -1..=1isize {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                if thin[j] && !edges[j] {
                    edges[j] = true;
                    queue.push_back(j);
                }
            }
        }
    }
    edges
}

/// Dense vote grid: one row of rho bins per whole degree of theta.
pub struct HoughAccumulator {
    votes: Vec<u32>,
    rho_bins: usize,
    /// Offset added to a rounded rho to get its bin.
    rho_offset: isize,
    diagonal: f64,
}

impl HoughAccumulator {
    pub fn from_edges(edges: &[bool], width: usize, height: usize) -> Self {
        let diagonal = ((width * width + height * height) as f64).sqrt();
        let rho_offset = diagonal.ceil() as isize;
        let rho_bins = 2 * rho_offset as usize + 1;
        let mut votes = vec![0u32; THETA_BINS * rho_bins];

        let trig: Vec<(f64, f64)> = (0..THETA_BINS)
            .map(|t| (t as f64).to_radians().sin_cos())
            .collect();

        for (i, _) in edges.iter().enumerate().filter(|(_, e)| **e) {
            let (x, y) = ((i % width) as f64, (i / width) as f64);
            for (t, &(s, c)) in trig.iter().enumerate() {
                let rho = (x * c + y * s).round() as isize + rho_offset;
                votes[t * rho_bins + rho as usize] += 1;
            }
        }

        Self {
            votes,
            rho_bins,
            rho_offset,
            diagonal,
        }
    }

    #[inline]
    fn at(&self, theta: usize, rho: usize) -> u32 {
        self.votes[theta * self.rho_bins + rho]
    }

    /// Local maxima at or above `threshold`, strongest first.
    ///
    /// A bin survives if no bin within `radius` (in both axes) has more
    /// votes; equal neighbours are broken by bin index so each plateau
    /// yields one peak.
    pub fn peaks(&self, threshold: u32, radius: usize, max_lines: usize) -> Vec<LineCandidate> {
        let r = radius as isize;
        let mut peaks = Vec::new();

        for t in 0..THETA_BINS {
            for p in 0..self.rho_bins {
                let v = self.at(t, p);
                if v < threshold {
                    continue;
                }
                let here = t * self.rho_bins + p;
                let mut is_peak = true;
                'window: for dt in -r..=r {
                    let nt = t as isize + dt;
                    if nt < 0 || nt >= THETA_BINS as isize {
                        continue;
                    }
                    for dp in -r..=r {
                        let np = p as isize + dp;
                        if np < 0 || np >= self.rho_bins as isize || (dt == 0 && dp == 0) {
                            continue;
                        }
                        let there = nt as usize * self.rho_bins + np as usize;
                        let nv = self.votes[there];
                        if nv > v || (nv == v && there < here) {
                            is_peak = false;
                            break 'window;
                        }
                    }
                }
                if is_peak {
                    peaks.push((t, p, v));
                }
            }
        }

        peaks.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1)));
        peaks.truncate(max_lines);

        peaks
            .into_iter()
            .map(|(t, p, v)| {
                let rho = self.refine_rho(t, p, v, radius) - self.rho_offset as f64;
                LineCandidate::new(rho, t as f64, v, self.diagonal)
            })
            .collect()
    }

    /// Vote-weighted centroid of the rho bins near a peak holding at least
    /// half its votes.
    fn refine_rho(&self, t: usize, p: usize, peak: u32, radius: usize) -> f64 {
        let lo = p.saturating_sub(radius);
        let hi = (p + radius).min(self.rho_bins - 1);
        let mut weighted = 0.0;
        let mut total = 0.0;
        for q in lo..=hi {
            let v = self.at(t, q);
            if 2 * v >= peak {
                weighted += q as f64 * v as f64;
                total += v as f64;
            }
        }
        if total > 0.0 { weighted / total } else { p as f64 }
    }
}

/// Crossing of two polar lines, `None` if they are (nearly) parallel.
pub fn intersect_polar_lines(a: &LineCandidate, b: &LineCandidate) -> Option<Point> {
    let (sin_a, cos_a) = a.theta_degrees.to_radians().sin_cos();
    let (sin_b, cos_b) = b.theta_degrees.to_radians().sin_cos();

    let denom = cos_a * sin_b - sin_a * cos_b;
    if denom.abs() < PARALLEL_EPS {
        return None;
    }

    let x = (a.rho * sin_b - b.rho * sin_a) / denom;
    let y = (b.rho * cos_a - a.rho * cos_b) / denom;
    Some(Point::new(x, y))
}

/// Acute angle between two lines, in degrees.
fn crossing_angle(a: &LineCandidate, b: &LineCandidate) -> f64 {
    let d = (a.theta_degrees - b.theta_degrees).abs() % 180.0;
    d.min(180.0 - d)
}

/// Pairwise crossings inside the image, scored by the summed votes.
pub fn intersect_lines(
    lines: &[LineCandidate],
    width: f64,
    height: f64,
    min_crossing_angle: f64,
) -> Vec<CornerCandidate> {
    let mut candidates = Vec::new();
    for (i, a) in lines.iter().enumerate() {
        for b in &lines[i + 1..] {
            if crossing_angle(a, b) < min_crossing_angle {
                continue;
            }
            let Some(p) = intersect_polar_lines(a, b) else {
                continue;
            };
            if p.x >= 0.0 && p.y >= 0.0 && p.x <= width - 1.0 && p.y <= height - 1.0 {
                candidates.push(CornerCandidate {
                    point: p,
                    score: (a.votes + b.votes) as f64,
                });
            }
        }
    }
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(rho: f64, theta: f64, votes: u32) -> LineCandidate {
        LineCandidate::new(rho, theta, votes, 500.0)
    }

    #[test]
    fn perpendicular_lines_intersect() {
        // y = 100 and x = 50.
        let h = line(100.0, 90.0, 10);
        let v = line(50.0, 0.0, 10);
        let p = intersect_polar_lines(&h, &v).expect("should intersect");
        assert!((p.x - 50.0).abs() < 1e-9 && (p.y - 100.0).abs() < 1e-9, "{p:?}");
    }

    #[test]
    fn parallel_lines_do_not_intersect() {
        assert!(intersect_polar_lines(&line(50.0, 0.0, 1), &line(100.0, 0.0, 1)).is_none());
    }

    /// Shallow crossings are skipped even though they are solvable.
    #[test]
    fn shallow_crossings_are_skipped() {
        let lines = [line(100.0, 90.0, 40), line(105.0, 80.0, 30), line(60.0, 0.0, 20)];
        let candidates = intersect_lines(&lines, 200.0, 200.0, 30.0);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].score, 60.0);
    }

    #[test]
    fn endpoints_lie_on_line() {
        let l = line(80.0, 30.0, 1);
        let (s, c) = 30f64.to_radians().sin_cos();
        for p in [l.endpoints.0, l.endpoints.1] {
            assert!((p.x * c + p.y * s - 80.0).abs() < 1e-9);
        }
    }

    /// A single straight edge produces exactly one strong peak.
    #[test]
    fn accumulator_finds_vertical_line() {
        let (w, h) = (60usize, 40usize);
        let mut edges = vec![false; w * h];
        for y in 0..h {
            edges[y * w + 25] = true;
        }
        let acc = HoughAccumulator::from_edges(&edges, w, h);
        let peaks = acc.peaks(30, 8, 4);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].theta_degrees, 0.0);
        assert!((peaks[0].rho - 25.0).abs() < 0.5);
        assert_eq!(peaks[0].votes, 40);
    }

    #[test]
    fn hysteresis_drops_isolated_weak_edges() {
        let (w, h) = (9usize, 9usize);
        let mut field = GradientField {
            width: w,
            height: h,
            dx: vec![0.0; w * h],
            dy: vec![0.0; w * h],
            magnitude: vec![0.0; w * h],
        };
        // Strong vertical ridge at x = 2, weak isolated one at x = 6.
        for y in 1..h - 1 {
            for (x, m) in [(2usize, 200.0f32), (6, 60.0)] {
                let i = y * w + x;
                field.dx[i] = m;
                field.magnitude[i] = m;
            }
        }
        let edges = hysteresis_edges(&field, 40.0, 100.0);
        assert!(edges[4 * w + 2]);
        assert!(!edges[4 * w + 6]);
    }
}
