// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// richtwerk-imaging: raster normalisation for scanned business documents.
//
// Provides impulse and edge-preserving denoising, page corner detection with
// a line-based fallback, perspective and skew correction, quality scoring,
// the staged document pipeline and a concurrent batch runner.

pub mod batch;
pub mod codec;
pub mod filters;
pub mod geometry;
pub mod pipeline;
pub mod quality;
pub mod raster;
pub mod structure;

// Re-export the primary types so callers can use `richtwerk_imaging::DocumentPipeline` etc.
pub use batch::{BatchInput, BatchOutcome, BatchRunner, Fingerprint};
pub use codec::{ImageCodec, RasterCodec};
pub use pipeline::{DocumentPipeline, NormalizationReport, NormalizationResult, StageTracker};
pub use quality::QualityAssessor;
pub use raster::{GrayscaleBuffer, RasterBuffer};
pub use structure::{LineBandAnalyzer, StructuralAnalyzer};
