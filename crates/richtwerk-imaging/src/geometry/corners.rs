// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document corner detection.
//
// Harris responses over a 3x3 structure-tensor window give corner candidates.
// The candidate nearest each image corner is taken as that corner of the
// document, and the outline is kept only when all four sides run along image
// edges; the corners are then placed where lines fitted to those edges cross.
// When Harris yields no such outline, lines from the Hough fallback are
// intersected instead.

use richtwerk_core::config::CornerConfig;
use richtwerk_core::types::Point;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::filters::convolution::{GradientField, gaussian_blur, sobel_gradients};
use crate::geometry::hough::{LineCandidate, detect_line_corners};
use crate::geometry::{is_convex_quad, shoelace_area};
use crate::raster::RasterBuffer;

/// Coverage at which the area term of the confidence saturates.
const FULL_COVERAGE_FRACTION: f64 = 0.5;
/// Confidence penalty for corners found from line crossings.
const FALLBACK_CONFIDENCE_FACTOR: f64 = 0.75;
/// Selected corners closer than this are the same point.
const MIN_CORNER_SEPARATION: f64 = 1.0;
/// Candidates weaker than this fraction of the strongest stay out of the
/// widened selection pool.
const WIDE_POOL_FRACTION: f64 = 0.01;
/// Side samples skip this fraction of the side length at either end.
const SIDE_MARGIN: f64 = 0.15;
/// Spacing of the samples along a side, in pixels.
const SIDE_SAMPLE_SPACING: f64 = 3.0;
const MIN_SIDE_SAMPLES: usize = 8;
/// How far across a side the edge is searched for, in pixels.
const EDGE_SEARCH_RADIUS: i32 = 6;
/// Minimum |cos| between an edge gradient and the side normal.
const EDGE_NORMAL_ALIGNMENT: f32 = 0.85;
/// A refined corner further than this from its candidate is not trusted.
const MAX_REFINEMENT_SHIFT: f64 = 12.0;

/// A candidate corner and its score (Harris response or summed Hough votes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CornerCandidate {
    pub point: Point,
    pub score: f64,
}

/// How the corners were found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Harris,
    HoughFallback,
    /// Not enough geometry for a document outline.
    InsufficientGeometry,
}

/// Result of corner detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CornerDetection {
    /// `[TL, TR, BR, BL]`, absent when the geometry was insufficient.
    pub corners: Option<[Point; 4]>,
    pub confidence: f64,
    pub method: DetectionMethod,
    /// Candidates available to the selection step.
    pub candidate_count: usize,
    /// Lines found by the fallback, empty when Harris succeeded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<LineCandidate>,
}

impl CornerDetection {
    pub fn insufficient(candidate_count: usize, lines: Vec<LineCandidate>) -> Self {
        Self {
            corners: None,
            confidence: 0.0,
            method: DetectionMethod::InsufficientGeometry,
            candidate_count,
            lines,
        }
    }
}

/// A page outline that passed every geometric check.
struct Outline {
    corners: [Point; 4],
    selected: [CornerCandidate; 4],
    area_fraction: f64,
}

/// Detects the four corners of a document page.
#[derive(Debug, Clone)]
pub struct CornerDetector {
    config: CornerConfig,
}

impl CornerDetector {
    pub fn new(config: &CornerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    #[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
    pub fn detect(&self, raster: &RasterBuffer) -> CornerDetection {
        let (w, h) = (raster.width() as usize, raster.height() as usize);
        if w < 7 || h < 7 {
            warn!("Raster too small for corner detection");
            return CornerDetection::insufficient(0, Vec::new());
        }

        let gray = gaussian_blur(&raster.to_grayscale(), self.config.blur_sigma);
        let field = sobel_gradients(&gray);

        let harris = self.harris_candidates(&field);
        let harris_count = harris.len();
        debug!(candidates = harris_count, "Harris candidates after suppression");

        if harris_count >= 4 {
            match self.fit_outline(harris, &field) {
                Some(outline) => return self.accept(outline, DetectionMethod::Harris, harris_count, Vec::new()),
                None => warn!(
                    candidates = harris_count,
                    "Harris corners do not outline a page; falling back to line crossings"
                ),
            }
        } else {
            warn!(harris = harris_count, "Too few Harris corners; falling back to line crossings");
        }

        let analysis = detect_line_corners(&field, &self.config);
        let candidate_count = analysis.candidates.len();
        if candidate_count < 4 {
            warn!(candidate_count, "Insufficient geometry for document corners");
            return CornerDetection::insufficient(candidate_count, analysis.lines);
        }
        match self.fit_outline(analysis.candidates, &field) {
            Some(outline) => self.accept(outline, DetectionMethod::HoughFallback, candidate_count, analysis.lines),
            None => {
                warn!(candidate_count, "Line crossings do not outline a page");
                CornerDetection::insufficient(candidate_count, analysis.lines)
            }
        }
    }

    fn accept(
        &self,
        outline: Outline,
        method: DetectionMethod,
        candidate_count: usize,
        lines: Vec<LineCandidate>,
    ) -> CornerDetection {
        let mut confidence = score_confidence(&outline.selected, outline.area_fraction);
        if method == DetectionMethod::HoughFallback {
            confidence *= FALLBACK_CONFIDENCE_FACTOR;
        }
        info!(?method, confidence, area_fraction = outline.area_fraction, "Document corners detected");
        CornerDetection {
            corners: Some(outline.corners),
            confidence,
            method,
            candidate_count,
            lines,
        }
    }

    /// Extreme selection over the strongest candidates first, then over every
    /// candidate of comparable strength when the first pick is not a page.
    fn fit_outline(&self, mut candidates: Vec<CornerCandidate>, field: &GradientField) -> Option<Outline> {
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        let top = self.config.top_candidates.max(4).min(candidates.len());
        if let Some(outline) = self.outline_from(&candidates[..top], field) {
            return Some(outline);
        }

        let floor = candidates.first()?.score * WIDE_POOL_FRACTION;
        let wide = candidates.iter().take_while(|c| c.score >= floor).count();
        if wide <= top {
            return None;
        }
        debug!(top, wide, "Widening corner selection");
        self.outline_from(&candidates[..wide], field)
    }

    fn outline_from(&self, pool: &[CornerCandidate], field: &GradientField) -> Option<Outline> {
        let (w, h) = (field.width as f64, field.height as f64);
        let selected = select_extremes(pool, w, h)?;
        let rough = selected.map(|c| c.point);
        if !distinct(&rough) || !is_convex_quad(&rough) {
            debug!(corners = ?rough, "Selected corners do not form a convex quadrilateral");
            return None;
        }

        let Some(corners) = refine_outline(field, &rough, &self.config) else {
            debug!(corners = ?rough, "Quadrilateral sides are not backed by edges");
            return None;
        };
        if !distinct(&corners) || !is_convex_quad(&corners) {
            debug!(?corners, "Refined corners do not form a convex quadrilateral");
            return None;
        }
        let area_fraction = shoelace_area(&corners) / (w * h);
        if area_fraction < self.config.min_area_fraction {
            debug!(area_fraction, "Detected quadrilateral too small");
            return None;
        }
        Some(Outline {
            corners,
            selected,
            area_fraction,
        })
    }

/// Harris responses above the threshold, thinned by non-maximum
    /// suppression.
    fn harris_candidates(&self, field: &GradientField) -> Vec<CornerCandidate> {
        let (w, h) = (field.width, field.height);
        let response = harris_response(field, self.config.harris_k);
        let threshold = self.config.harris_threshold;
        let r = self.config.nms_radius as isize;

        let mut candidates = Vec::new();
        for y in 2..h - 2 {
            for x in 2..w - 2 {
                let here = y * w + x;
                let v = response[here];
                if v <= threshold {
                    continue;
                }
                let mut is_max = true;
                'window: for dy in -r..=r {
                    let ny = y as isize + dy;
                    if ny < 0 || ny >= h as isize {
                        continue;
                    }
                    for dx in -r..=r {
                        let nx = x as isize + dx;
                        if nx < 0 || nx >= w as isize || (dx == 0 && dy == 0) {
                            continue;
                        }
                        let there = ny as usize * w + nx as usize;
                        let nv = response[there];
                        if nv > v || (nv == v && there < here) {
                            is_max = false;
                            break 'window;
                        }
                    }
                }
                if is_max {
                    candidates.push(CornerCandidate {
                        point: Point::new(x as f64, y as f64),
                        score: v,
                    });
                }
            }
        }
        candidates
    }
}

/// `det(M) - k * trace(M)^2` for the 3x3 structure tensor at every pixel
/// whose window lies inside the gradient interior; zero elsewhere.
pub fn harris_response(field: &GradientField, k: f64) -> Vec<f64> {
    let (w, h) = (field.width, field.height);
    let n = w * h;
    let mut xx = vec![0f64; n];
    let mut yy = vec![0f64; n];
    let mut xy = vec![0f64; n];
    for i in 0..n {
        let (gx, gy) = (field.dx[i] as f64, field.dy[i] as f64);
        xx[i] = gx * gx;
        yy[i] = gy * gy;
        xy[i] = gx * gy;
    }

    let mut response = vec![0f64; n];
    if w < 5 || h < 5 {
        return response;
    }
    for y in 2..h - 2 {
        for x in 2..w - 2 {
            let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
            for wy in y - 1..=y + 1 {
                let row = wy * w;
                for wx in x - 1..=x + 1 {
                    sxx += xx[row + wx];
                    syy += yy[row + wx];
                    sxy += xy[row + wx];
                }
            }
            let det = sxx * syy - sxy * sxy;
            let trace = sxx + syy;
            response[y * w + x] = det - k * trace * trace;
        }
    }
    response
}

/// For each image corner (TL, TR, BR, BL) the nearest candidate; the input
/// is sorted by descending score so ties go to the stronger candidate.
/// `None` for an empty pool.
fn select_extremes(candidates: &[CornerCandidate], width: f64, height: f64) -> Option<[CornerCandidate; 4]> {
    let (first, rest) = candidates.split_first()?;
    let extremes = [
        Point::new(0.0, 0.0),
        Point::new(width - 1.0, 0.0),
        Point::new(width - 1.0, height - 1.0),
        Point::new(0.0, height - 1.0),
    ];
    Some(extremes.map(|target| {
        let mut best = *first;
        let mut best_distance = best.point.distance_to(&target);
        for c in rest {
            let d = c.point.distance_to(&target);
            if d < best_distance {
                best = *c;
                best_distance = d;
            }
        }
        best
    }))
}

/// A straight line through `origin` along the unit vector `(dx, dy)`.
#[derive(Debug, Clone, Copy)]
struct FittedLine {
    origin: Point,
    dx: f64,
    dy: f64,
}

impl FittedLine {
    /// Total least-squares fit; `None` for fewer than two distinct points.
    fn through(points: &[Point]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let n = points.len() as f64;
        let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
        let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for p in points {
            let (x, y) = (p.x - cx, p.y - cy);
            sxx += x * x;
            syy += y * y;
            sxy += x * y;
        }
        if !(sxx + syy > 0.0) {
            return None;
        }
        let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
        Some(Self {
            origin: Point::new(cx, cy),
            dx: theta.cos(),
            dy: theta.sin(),
        })
    }

    fn intersect(&self, other: &FittedLine) -> Option<Point> {
        let cross = self.dx * other.dy - self.dy * other.dx;
        if cross.abs() < 1e-3 {
            return None;
        }
        let (ox, oy) = (other.origin.x - self.origin.x, other.origin.y - self.origin.y);
        let t = (ox * other.dy - oy * other.dx) / cross;
        let p = Point::new(self.origin.x + t * self.dx, self.origin.y + t * self.dy);
        (p.x.is_finite() && p.y.is_finite()).then_some(p)
    }
}

/// Checks that every side of `rough` runs along an image edge and moves each
/// corner to the crossing of the lines fitted to its two sides.
///
/// `None` when a side has edge support on fewer than
/// `edge_support_fraction` of its samples.
fn refine_outline(field: &GradientField, rough: &[Point; 4], config: &CornerConfig) -> Option<[Point; 4]> {
    let threshold = field.max_magnitude() * config.edge_magnitude_fraction as f32;
    if !(threshold > 0.0) {
        return None;
    }

    let mut sides = Vec::with_capacity(4);
    for i in 0..4 {
        let (edge_points, samples) = trace_side(field, rough[i], rough[(i + 1) % 4], threshold);
        let support = edge_points.len() as f64 / samples as f64;
        if support < config.edge_support_fraction {
            debug!(side = i, support, "Side lacks edge support");
            return None;
        }
        sides.push(FittedLine::through(&edge_points)?);
    }

    let mut corners = *rough;
    for (i, corner) in corners.iter_mut().enumerate() {
        let crossing = sides[(i + 3) % 4].intersect(&sides[i])?;
        if crossing.distance_to(&rough[i]) <= MAX_REFINEMENT_SHIFT {
            *corner = crossing;
        }
    }
    Some(corners)
}

/// Edge locations found across the side `a -> b`, and the number of places
/// searched.
fn trace_side(field: &GradientField, a: Point, b: Point, threshold: f32) -> (Vec<Point>, usize) {
    let length = a.distance_to(&b);
    let usable = length * (1.0 - 2.0 * SIDE_MARGIN);
    let samples = ((usable / SIDE_SAMPLE_SPACING) as usize).max(MIN_SIDE_SAMPLES);
    if !(length > 0.0) {
        return (Vec::new(), samples);
    }
    let normal = ((a.y - b.y) / length, (b.x - a.x) / length);

    let found = (0..samples)
        .filter_map(|s| {
            let t = SIDE_MARGIN + (1.0 - 2.0 * SIDE_MARGIN) * (s as f64 + 0.5) / samples as f64;
            let base = Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t);
            edge_crossing(field, base, normal, threshold)
        })
        .collect();
    (found, samples)
}

/// Strongest aligned gradient along the normal through `base`, located to
/// sub-pixel precision with a parabola through its neighbours.
fn edge_crossing(field: &GradientField, base: Point, normal: (f64, f64), threshold: f32) -> Option<Point> {
    let at = |k: f64| Point::new(base.x + normal.0 * k, base.y + normal.1 * k);

    let mut best: Option<(i32, f32)> = None;
    for k in -EDGE_SEARCH_RADIUS..=EDGE_SEARCH_RADIUS {
        let p = at(k as f64);
        let Some(m) = bilinear(field, &field.magnitude, p) else {
            continue;
        };
        if m < threshold || best.is_some_and(|(_, bm)| m <= bm) {
            continue;
        }
        let gx = bilinear(field, &field.dx, p)?;
        let gy = bilinear(field, &field.dy, p)?;
        let along_normal = (gx as f64 * normal.0 + gy as f64 * normal.1).abs() as f32;
        if along_normal >= EDGE_NORMAL_ALIGNMENT * m {
            best = Some((k, m));
        }
    }

    let (k, m) = best?;
    let offset = match (
        bilinear(field, &field.magnitude, at((k - 1) as f64)),
        bilinear(field, &field.magnitude, at((k + 1) as f64)),
    ) {
        (Some(l), Some(r)) if l - 2.0 * m + r < 0.0 => (0.5 * (l - r) / (l - 2.0 * m + r)).clamp(-0.5, 0.5),
        _ => 0.0,
    };
    Some(at(k as f64 + offset as f64))
}

/// Bilinear sample of a per-pixel plane; `None` outside the field.
fn bilinear(field: &GradientField, plane: &[f32], p: Point) -> Option<f32> {
    let max_x = (field.width - 1) as f64;
    let max_y = (field.height - 1) as f64;
    if !(p.x >= 0.0 && p.y >= 0.0 && p.x <= max_x && p.y <= max_y) {
        return None;
    }
    let (x0, y0) = (p.x.floor() as usize, p.y.floor() as usize);
    let (x1, y1) = ((x0 + 1).min(field.width - 1), (y0 + 1).min(field.height - 1));
    let (fx, fy) = ((p.x - x0 as f64) as f32, (p.y - y0 as f64) as f32);
    let top = plane[field.index(x0, y0)] * (1.0 - fx) + plane[field.index(x1, y0)] * fx;
    let bottom = plane[field.index(x0, y1)] * (1.0 - fx) + plane[field.index(x1, y1)] * fx;
    Some(top * (1.0 - fy) + bottom * fy)
}

fn distinct(corners: &[Point; 4]) -> bool {
    (0..4).all(|i| (i + 1..4).all(|j| corners[i].distance_to(&corners[j]) >= MIN_CORNER_SEPARATION))
}

/// `sqrt(min / max)` of the selected scores times a coverage term.
fn score_confidence(selected: &[CornerCandidate; 4], area_fraction: f64) -> f64 {
    let max = selected.iter().map(|c| c.score).fold(f64::MIN, f64::max);
    let min = selected.iter().map(|c| c.score).fold(f64::MAX, f64::min);
    if !(max > 0.0) || min <= 0.0 {
        return 0.0;
    }
    let balance = (min / max).sqrt();
    let coverage = (area_fraction / FULL_COVERAGE_FRACTION).min(1.0);
    (balance * coverage).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// White quadrilateral on black, filled where the pixel centre is inside.
    fn quad_image(w: u32, h: u32, quad: &[Point; 4]) -> RasterBuffer {
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                let p = Point::new(x as f64, y as f64);
                let inside = (0..4).all(|i| {
                    let a = quad[i];
                    let b = quad[(i + 1) % 4];
                    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x) >= 0.0
                });
                let v = if inside { 255 } else { 0 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        RasterBuffer::new(w, h, 3, data).expect("raster")
    }

    fn skewed_quad() -> [Point; 4] {
        [
            Point::new(40.0, 50.0),
            Point::new(160.0, 40.0),
            Point::new(170.0, 150.0),
            Point::new(50.0, 160.0),
        ]
    }

    fn assert_near(found: &[Point; 4], expected: &[Point; 4], tol: f64) {
        for (f, e) in found.iter().zip(expected.iter()) {
            assert!(f.distance_to(e) <= tol, "found {f:?}, expected {e:?}");
        }
    }

    /// Rotated light page with rows of dark bars inside it, on black.
    fn page_with_bars(w: u32, h: u32, page_w: f64, page_h: f64, angle: f64) -> (RasterBuffer, [Point; 4]) {
        let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
        let (half_w, half_h) = (page_w / 2.0, page_h / 2.0);
        let (s, c) = angle.to_radians().sin_cos();
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                let (dx, dy) = (x as f64 - cx, y as f64 - cy);
                let u = c * dx + s * dy;
                let v = -s * dx + c * dy;
                let value = if u.abs() > half_w || v.abs() > half_h {
                    0
                } else if (v + half_h - 20.0).rem_euclid(16.0) < 4.0
                    && v < half_h - 20.0
                    && u.abs() < half_w - 25.0
                {
                    70
                } else {
                    250
                };
                data.extend_from_slice(&[value, value, value]);
            }
        }
        let corner = |u: f64, v: f64| Point::new(cx + c * u - s * v, cy + s * u + c * v);
        let corners = [
            corner(-half_w, -half_h),
            corner(half_w, -half_h),
            corner(half_w, half_h),
            corner(-half_w, half_h),
        ];
        (RasterBuffer::new(w, h, 3, data).expect("raster"), corners)
    }

    /// Harris locates all four corners of a skewed page to sub-pixel
    /// precision.
    #[test]
    fn harris_finds_skewed_quadrilateral() {
        let quad = skewed_quad();
        let raster = quad_image(200, 200, &quad);
        let detection = CornerDetector::new(&CornerConfig::default()).detect(&raster);

        assert_eq!(detection.method, DetectionMethod::Harris);
        let corners = detection.corners.expect("corners");
        assert_near(&corners, &quad, 1.0);
        assert!(detection.confidence > 0.0 && detection.confidence <= 1.0);
    }

    /// Strong corners of printed marks inside the page do not displace the
    /// page outline.
    #[test]
    fn page_outline_wins_over_interior_marks() {
        let (raster, page) = page_with_bars(320, 260, 240.0, 180.0, 4.0);
        let detection = CornerDetector::new(&CornerConfig::default()).detect(&raster);

        assert_eq!(detection.method, DetectionMethod::Harris);
        let corners = detection.corners.expect("corners");
        assert_near(&corners, &page, 1.5);
    }

    /// A quadrilateral drawn inside a flat region has no edges under its
    /// sides.
    #[test]
    fn outline_without_edges_is_rejected() {
        let quad = skewed_quad();
        let raster = quad_image(200, 200, &quad);
        let config = CornerConfig::default();
        let field = sobel_gradients(&gaussian_blur(&raster.to_grayscale(), config.blur_sigma));

        let inner = [
            Point::new(70.0, 75.0),
            Point::new(135.0, 70.0),
            Point::new(140.0, 130.0),
            Point::new(75.0, 135.0),
        ];
        assert!(refine_outline(&field, &inner, &config).is_none());

        let rough = [
            Point::new(42.0, 52.0),
            Point::new(158.0, 42.0),
            Point::new(168.0, 148.0),
            Point::new(52.0, 158.0),
        ];
        let refined = refine_outline(&field, &rough, &config).expect("sides lie on edges");
        assert_near(&refined, &quad, 1.0);
    }

    #[test]
    fn extremes_of_an_empty_pool_are_none() {
        assert!(select_extremes(&[], 100.0, 100.0).is_none());
    }

    /// With Harris disabled by an unreachable threshold, line crossings
    /// still find the page.
    #[test]
    fn hough_fallback_finds_skewed_quadrilateral() {
        let quad = skewed_quad();
        let raster = quad_image(200, 200, &quad);
        let config = CornerConfig {
            harris_threshold: f64::MAX,
            ..CornerConfig::default()
        };
        let detection = CornerDetector::new(&config).detect(&raster);

        assert_eq!(detection.method, DetectionMethod::HoughFallback);
        assert!(detection.lines.len() >= 4);
        let corners = detection.corners.expect("corners");
        assert_near(&corners, &quad, 4.0);
        assert!(detection.confidence > 0.0 && detection.confidence <= 0.75);
    }

    #[test]
    fn uniform_images_have_insufficient_geometry() {
        for value in [0u8, 255] {
            let raster = RasterBuffer::filled(120, 90, [value; 3]).expect("raster");
            let detection = CornerDetector::new(&CornerConfig::default()).detect(&raster);
            assert_eq!(detection.method, DetectionMethod::InsufficientGeometry);
            assert!(detection.corners.is_none());
            assert_eq!(detection.confidence, 0.0);
        }
    }

    /// A small blob is rejected by the coverage check.
    #[test]
    fn small_quadrilateral_is_rejected() {
        let quad = [
            Point::new(90.0, 90.0),
            Point::new(110.0, 90.0),
            Point::new(110.0, 110.0),
            Point::new(90.0, 110.0),
        ];
        let raster = quad_image(200, 200, &quad);
        let detection = CornerDetector::new(&CornerConfig::default()).detect(&raster);
        assert!(detection.corners.is_none());
        assert_eq!(detection.confidence, 0.0);
    }

    #[test]
    fn confidence_balances_scores_and_coverage() {
        let mk = |score| CornerCandidate {
            point: Point::default(),
            score,
        };
        let even = [mk(100.0), mk(100.0), mk(100.0), mk(100.0)];
        assert!((score_confidence(&even, 0.6) - 1.0).abs() < 1e-12);
        assert!((score_confidence(&even, 0.25) - 0.5).abs() < 1e-12);

        let uneven = [mk(400.0), mk(100.0), mk(200.0), mk(300.0)];
        assert!((score_confidence(&uneven, 0.5) - 0.5).abs() < 1e-12);
    }
}
