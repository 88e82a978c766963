// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Richtwerk.
//
// Only buffer-shape validation, resource limits and collaborator I/O can fail.
// Degraded geometry (too few corners, parallel lines, flat histograms) is not
// an error and never reaches this type.

use thiserror::Error;

use crate::types::PipelineState;

/// Top-level error type for all Richtwerk operations.
#[derive(Debug, Error)]
pub enum RichtwerkError {
    // -- Input errors --
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("raster needs {required} bytes of working memory, limit is {limit}")]
    ResourceExhaustion { required: u64, limit: u64 },

    // -- Codec collaborator --
    #[error("image processing failed: {0}")]
    Image(String),

    // -- Pipeline --
    #[error("stage {stage} failed after {elapsed_ms:.1} ms: {source}")]
    StageFailed {
        stage: PipelineState,
        elapsed_ms: f64,
        #[source]
        source: Box<RichtwerkError>,
    },

    #[error("illegal pipeline transition from {from} to {to}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },

    #[error("document timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    #[error("worker task failed: {0}")]
    TaskJoin(String),

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RichtwerkError {
    /// Attach the failing stage and elapsed time to an error.
    ///
    /// Errors that already carry a stage are returned unchanged.
    pub fn in_stage(self, stage: PipelineState, elapsed_ms: f64) -> Self {
        match self {
            already @ Self::StageFailed { .. } => already,
            other => Self::StageFailed {
                stage,
                elapsed_ms,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through stage wrappers.
    pub fn root(&self) -> &RichtwerkError {
        match self {
            Self::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RichtwerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_is_attached_once() {
        let err = RichtwerkError::InvalidInput("zero width".into())
            .in_stage(PipelineState::Loaded, 0.5)
            .in_stage(PipelineState::Enhanced, 9.0);
        match &err {
            RichtwerkError::StageFailed { stage, .. } => assert_eq!(*stage, PipelineState::Loaded),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(err.root(), RichtwerkError::InvalidInput(_)));
    }

    #[test]
    fn stage_failure_message_names_stage() {
        let err = RichtwerkError::Image("decode".into()).in_stage(PipelineState::Preprocessed, 12.25);
        let text = err.to_string();
        assert!(text.contains("preprocessed"), "{text}");
        assert!(text.contains("12.2") || text.contains("12.3"), "{text}");
    }
}
