// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Richtwerk document normaliser.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a processed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point in pixel coordinates (x to the right, y downwards).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Lifecycle states of a document moving through the normalisation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    /// Raster decoded and shape-validated.
    Loaded,
    /// Input quality metrics computed.
    QualityAssessed,
    /// Impulse noise suppressed, perspective and skew corrected.
    Preprocessed,
    /// Edge-preserving smoothing and contrast stretch applied.
    Enhanced,
    /// Structural regions reported by the analyser.
    StructurallyAnalyzed,
    /// Result assembled and handed off.
    Finalized,
    /// A stage failed. No corrected raster is produced.
    Failed,
}

impl PipelineState {
    /// The regular successor of this state, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Loaded => Some(Self::QualityAssessed),
            Self::QualityAssessed => Some(Self::Preprocessed),
            Self::Preprocessed => Some(Self::Enhanced),
            Self::Enhanced => Some(Self::StructurallyAnalyzed),
            Self::StructurallyAnalyzed => Some(Self::Finalized),
            Self::Finalized | Self::Failed => None,
        }
    }

    /// Whether moving from `self` to `to` is a legal transition.
    ///
    /// Only the regular successor is allowed, plus `Failed` from any
    /// non-terminal state.
    pub fn can_transition_to(&self, to: PipelineState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Failed || self.next() == Some(to)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Failed)
    }

    /// Stable lowercase name used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::QualityAssessed => "quality_assessed",
            Self::Preprocessed => "preprocessed",
            Self::Enhanced => "enhanced",
            Self::StructurallyAnalyzed => "structurally_analyzed",
            Self::Finalized => "finalized",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing and confidence recorded for one pipeline transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// State reached by this transition.
    pub stage: PipelineState,
    /// Wall-clock time spent in the stage, in milliseconds.
    pub elapsed_ms: f64,
    pub success: bool,
    /// Confidence of the stage's algorithm(s), 0.0 - 1.0.
    pub confidence: f64,
    /// Free-form remark (e.g. why a correction was skipped).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Quality measurements for one raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageQualityMetrics {
    pub width: u32,
    pub height: u32,
    /// Dominant text-line angle in degrees (positive = descending to the right).
    pub skew_angle: f64,
    /// Deviation of the detected page outline from a rectangle, 0.0 - 1.0.
    pub perspective_distortion: f64,
    /// Fraction of pixels that look like impulse noise, 0.0 - 1.0.
    pub noise_level: f64,
    /// Variance of the Laplacian of the luminance.
    pub sharpness: f64,
    /// Standard deviation of the luminance.
    pub contrast: f64,
    /// Mean luminance, 0 - 255.
    pub brightness: f64,
    /// Weighted overall score, 0.0 - 1.0.
    pub overall: f64,
}

/// Output encodings supported by the codec collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg { quality: u8 },
    Tiff,
}

impl OutputFormat {
    /// File extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg { .. } => "jpg",
            Self::Tiff => "tiff",
        }
    }

    /// Infer an output format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg { quality: 90 }),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }
}

/// Axis-aligned rectangle in pixel coordinates (inclusive origin, exclusive extent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Kinds of structural regions reported to downstream stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionKind {
    /// A horizontal band of text lines.
    TextBand,
    /// A ruled or aligned table.
    Table,
}

/// A structural region on the corrected raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub kind: RegionKind,
    pub bbox: BoundingBox,
    pub confidence: f64,
}

/// Structural metadata handed to text/table extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralAnalysis {
    pub regions: Vec<Region>,
    pub tables: Vec<Region>,
}
