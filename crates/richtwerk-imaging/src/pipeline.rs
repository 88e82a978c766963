// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document normalisation pipeline.
//
// One run takes a decoded raster through
//
//   Loaded → QualityAssessed → Preprocessed → Enhanced
//          → StructurallyAnalyzed → Finalized
//
// recording timing and confidence for every stage. Any failure moves the run
// to `Failed` and surfaces the error with the stage and elapsed time attached.

use std::time::Instant;

use chrono::{DateTime, Utc};
use richtwerk_core::config::PipelineConfig;
use richtwerk_core::error::{Result, RichtwerkError};
use richtwerk_core::transform::TransformChain;
use richtwerk_core::types::{DocumentId, ImageQualityMetrics, PipelineState, StageReport, StructuralAnalysis};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::codec::RasterCodec;
use crate::filters::{AdaptiveMedianFilter, BilateralFilter, ContrastStretch};
use crate::geometry::corners::{CornerDetection, CornerDetector};
use crate::geometry::homography::PerspectiveCorrector;
use crate::geometry::skew::SkewCorrector;
use crate::quality::QualityAssessor;
use crate::raster::RasterBuffer;
use crate::structure::{LineBandAnalyzer, StructuralAnalyzer};

/// Enforces the stage order of one run and collects its stage reports.
#[derive(Debug, Default)]
pub struct StageTracker {
    state: Option<PipelineState>,
    reports: Vec<StageReport>,
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state; `None` before the raster is loaded.
    pub fn state(&self) -> Option<PipelineState> {
        self.state
    }

    pub fn reports(&self) -> &[StageReport] {
        &self.reports
    }

    fn check(&self, to: PipelineState) -> Result<()> {
        let legal = match self.state {
            None => to == PipelineState::Loaded || to == PipelineState::Failed,
            Some(from) => from.can_transition_to(to),
        };
        if legal {
            Ok(())
        } else {
            Err(RichtwerkError::InvalidTransition {
                from: self.state.unwrap_or(PipelineState::Loaded),
                to,
            })
        }
    }

    /// Move to `to`, recording a successful stage report.
    pub fn advance(&mut self, to: PipelineState, elapsed_ms: f64, confidence: f64, note: Option<String>) -> Result<()> {
        self.check(to)?;
        self.state = Some(to);
        self.reports.push(StageReport {
            stage: to,
            elapsed_ms,
            success: true,
            confidence: confidence.clamp(0.0, 1.0),
            note,
        });
        Ok(())
    }

    /// Record that `stage` failed and move to `Failed`.
    pub fn fail(&mut self, stage: PipelineState, elapsed_ms: f64, reason: &RichtwerkError) {
        self.reports.push(StageReport {
            stage,
            elapsed_ms,
            success: false,
            confidence: 0.0,
            note: Some(reason.to_string()),
        });
        self.state = Some(PipelineState::Failed);
    }
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct NormalizationResult {
    pub id: DocumentId,
    /// Corrected, denoised and enhanced raster.
    pub raster: RasterBuffer,
    /// Geometric transformations applied, in order.
    pub transforms: TransformChain,
    pub input_metrics: ImageQualityMetrics,
    pub output_metrics: ImageQualityMetrics,
    pub stages: Vec<StageReport>,
    pub structure: StructuralAnalysis,
    /// Corner detection on the noise-reduced input, absent when the quality
    /// gate skipped geometric correction.
    pub corner_detection: Option<CornerDetection>,
    /// Skew estimated after perspective correction, in degrees.
    pub skew_angle: Option<f64>,
    pub state: PipelineState,
    /// Mean of the stage confidences.
    pub confidence: f64,
    pub processed_at: DateTime<Utc>,
    pub elapsed_ms: f64,
}

impl NormalizationResult {
    /// Serialisable summary without pixel data.
    pub fn report(&self) -> NormalizationReport {
        NormalizationReport {
            id: self.id,
            width: self.raster.width(),
            height: self.raster.height(),
            transforms: self.transforms.clone(),
            input_metrics: self.input_metrics.clone(),
            output_metrics: self.output_metrics.clone(),
            stages: self.stages.clone(),
            structure: self.structure.clone(),
            corner_detection: self.corner_detection.clone(),
            skew_angle: self.skew_angle,
            state: self.state,
            confidence: self.confidence,
            processed_at: self.processed_at,
            elapsed_ms: self.elapsed_ms,
        }
    }
}

/// JSON-friendly summary of a run.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizationReport {
    pub id: DocumentId,
    pub width: u32,
    pub height: u32,
    pub transforms: TransformChain,
    pub input_metrics: ImageQualityMetrics,
    pub output_metrics: ImageQualityMetrics,
    pub stages: Vec<StageReport>,
    pub structure: StructuralAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corner_detection: Option<CornerDetection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skew_angle: Option<f64>,
    pub state: PipelineState,
    pub confidence: f64,
    pub processed_at: DateTime<Utc>,
    pub elapsed_ms: f64,
}

/// Output of the geometric preprocessing stage.
struct Preprocessed {
    raster: RasterBuffer,
    confidence: f64,
    note: Option<String>,
    corner_detection: Option<CornerDetection>,
    skew_angle: Option<f64>,
}

/// Runs the normalisation stages for one document at a time.
pub struct DocumentPipeline<'a> {
    config: &'a PipelineConfig,
    codec: &'a dyn RasterCodec,
    analyzer: Box<dyn StructuralAnalyzer + 'a>,
    assessor: QualityAssessor,
}

impl<'a> DocumentPipeline<'a> {
    /// Fails with `Config` when the configuration does not validate.
    pub fn new(config: &'a PipelineConfig, codec: &'a dyn RasterCodec) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            codec,
            analyzer: Box::new(LineBandAnalyzer::default()),
            assessor: QualityAssessor::new(config),
        })
    }

    /// Replace the built-in line band analyser.
    pub fn with_analyzer(mut self, analyzer: impl StructuralAnalyzer + 'a) -> Self {
        self.analyzer = Box::new(analyzer);
        self
    }

    /// Build the raster from raw samples inside the `Loaded` stage, so shape
    /// errors carry the stage.
    pub fn run_samples(&self, width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<NormalizationResult> {
        let started = Instant::now();
        match RasterBuffer::new(width, height, channels, data) {
            Ok(raster) => self.run(raster),
            Err(err) => {
                let elapsed = elapsed_ms(started);
                warn!(error = %err, "Raster rejected");
                Err(err.in_stage(PipelineState::Loaded, elapsed))
            }
        }
    }

    /// Normalise one raster.
    #[instrument(skip_all, fields(width = raster.width(), height = raster.height()))]
    pub fn run(&self, raster: RasterBuffer) -> Result<NormalizationResult> {
        let id = DocumentId::new();
        let started = Instant::now();
        let mut tracker = StageTracker::new();
        info!(%id, "Normalisation started");

        // -- Loaded ----------------------------------------------------------
        let t = Instant::now();
        let loaded = self.check_limits(&raster).map(|()| (1.0, None));
        self.stage(&mut tracker, PipelineState::Loaded, t, loaded)?;

        // -- QualityAssessed -------------------------------------------------
        let t = Instant::now();
        let input_metrics = self.assessor.assess(&raster);
        self.stage(&mut tracker, PipelineState::QualityAssessed, t, Ok((1.0, None)))?;

        // -- Preprocessed ----------------------------------------------------
        let t = Instant::now();
        let mut transforms = TransformChain::new();
        let pre = match self.preprocess(&raster, &input_metrics, &mut transforms) {
            Ok(pre) => pre,
            Err(err) => return Err(self.fail(&mut tracker, PipelineState::Preprocessed, t, err)),
        };
        self.stage(&mut tracker, PipelineState::Preprocessed, t, Ok((pre.confidence, pre.note.clone())))?;

        // -- Enhanced --------------------------------------------------------
        let t = Instant::now();
        let enhanced = self.enhance(&pre.raster);
        self.stage(&mut tracker, PipelineState::Enhanced, t, Ok((1.0, None)))?;

        // -- StructurallyAnalyzed --------------------------------------------
        let t = Instant::now();
        let structure = self.analyzer.analyze(&enhanced);
        let structure_confidence = mean(structure.regions.iter().map(|r| r.confidence)).unwrap_or(0.0);
        self.stage(&mut tracker, PipelineState::StructurallyAnalyzed, t, Ok((structure_confidence, None)))?;

        // -- Finalized -------------------------------------------------------
        let t = Instant::now();
        let output_metrics = self.assessor.assess(&enhanced);
        let overall = output_metrics.overall;
        self.stage(&mut tracker, PipelineState::Finalized, t, Ok((overall, None)))?;

        let confidence = mean(tracker.reports().iter().map(|r| r.confidence)).unwrap_or(0.0);
        let elapsed = elapsed_ms(started);
        info!(
            %id,
            elapsed_ms = elapsed,
            transforms = transforms.len(),
            quality_before = input_metrics.overall,
            quality_after = output_metrics.overall,
            "Normalisation finished"
        );

        Ok(NormalizationResult {
            id,
            raster: enhanced,
            transforms,
            input_metrics,
            output_metrics,
            stages: tracker.reports().to_vec(),
            structure,
            corner_detection: pre.corner_detection,
            skew_angle: pre.skew_angle,
            state: PipelineState::Finalized,
            confidence,
            processed_at: Utc::now(),
            elapsed_ms: elapsed,
        })
    }

    /// Record the outcome of a stage (confidence and note), or fail the run.
    fn stage(
        &self,
        tracker: &mut StageTracker,
        stage: PipelineState,
        started: Instant,
        outcome: Result<(f64, Option<String>)>,
    ) -> Result<()> {
        let outcome = outcome.and_then(|(confidence, note)| {
            tracker.advance(stage, elapsed_ms(started), confidence, note)
        });
        match outcome {
            Ok(()) => {
                debug!(stage = %stage, elapsed_ms = elapsed_ms(started), "Stage complete");
                Ok(())
            }
            Err(err) => Err(self.fail(tracker, stage, started, err)),
        }
    }

    fn fail(&self, tracker: &mut StageTracker, stage: PipelineState, started: Instant, err: RichtwerkError) -> RichtwerkError {
        let elapsed = elapsed_ms(started);
        warn!(stage = %stage, error = %err, "Stage failed");
        tracker.fail(stage, elapsed, &err);
        err.in_stage(stage, elapsed)
    }

    fn check_limits(&self, raster: &RasterBuffer) -> Result<()> {
        let required = raster.working_set_bytes();
        let limit = self.config.limits.max_buffer_bytes;
        if required > limit {
            return Err(RichtwerkError::ResourceExhaustion { required, limit });
        }
        Ok(())
    }

    /// Impulse suppression, then perspective and skew correction.
    fn preprocess(
        &self,
        raster: &RasterBuffer,
        input: &ImageQualityMetrics,
        transforms: &mut TransformChain,
    ) -> Result<Preprocessed> {
        let denoised = AdaptiveMedianFilter::new(self.config.denoise.median_max_window).apply(raster);

        let gate = self.config.quality.min_quality_for_correction;
        if input.overall < gate {
            warn!(overall = input.overall, gate, "Quality below gate; geometric correction skipped");
            return Ok(Preprocessed {
                raster: denoised,
                confidence: 0.0,
                note: Some(format!(
                    "geometric correction skipped: quality {:.3} below {:.3}",
                    input.overall, gate
                )),
                corner_detection: None,
                skew_angle: None,
            });
        }

        let detection = CornerDetector::new(&self.config.corners).detect(&denoised);
        let perspective = PerspectiveCorrector::new().correct(&denoised, &detection, self.codec)?;
        if perspective.applied {
            transforms.push(perspective.transformation.clone());
        }

        let skew = SkewCorrector::new(&self.config.skew).correct(&perspective.raster, self.codec)?;
        if let Some(rotation) = skew.transformation.clone() {
            transforms.push(rotation);
        }

        let confidence = (perspective.transformation.confidence + skew.confidence) / 2.0;
        Ok(Preprocessed {
            raster: skew.raster,
            confidence,
            note: None,
            corner_detection: Some(detection),
            skew_angle: Some(skew.angle_degrees),
        })
    }

    fn enhance(&self, raster: &RasterBuffer) -> RasterBuffer {
        let denoise = &self.config.denoise;
        let enhance = &self.config.enhance;
        let smoothed = if enhance.bilateral {
            BilateralFilter::new(denoise.bilateral_spatial_sigma, denoise.bilateral_range_sigma).apply(raster)
        } else {
            raster.clone()
        };
        if enhance.contrast_stretch {
            ContrastStretch::new(enhance.stretch_low_percentile, enhance.stretch_high_percentile).apply(&smoothed)
        } else {
            smoothed
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}
