// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-language failure reasons for people feeding scans into Richtwerk.
//
// Every technical error is mapped to a short message and a concrete
// suggestion. Stage wrappers are looked through so the reason always
// describes the underlying cause.

use serde::Serialize;

use crate::error::RichtwerkError;
use crate::types::PipelineState;

/// Severity of an error from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Worth retrying as-is (busy machine, interrupted write).
    Transient,
    /// The operator has to change something (file, config, limits).
    ActionRequired,
    /// This input will never normalise.
    Permanent,
}

/// A human-readable error with a plain message and an actionable suggestion.
#[derive(Debug, Clone, Serialize)]
pub struct HumanError {
    /// One-line summary.
    pub message: String,
    /// What to try next.
    pub suggestion: String,
    /// Whether an automatic retry can help.
    pub retriable: bool,
    pub severity: Severity,
    /// Pipeline stage the failure happened in, when known.
    pub stage: Option<PipelineState>,
}

/// Convert a `RichtwerkError` into a `HumanError`.
pub fn humanize_error(err: &RichtwerkError) -> HumanError {
    let stage = match err {
        RichtwerkError::StageFailed { stage, .. } => Some(*stage),
        _ => None,
    };
    let mut human = humanize_root(err.root());
    human.stage = stage;
    human
}

fn humanize_root(err: &RichtwerkError) -> HumanError {
    let plain = |message: &str, suggestion: String, retriable: bool, severity: Severity| HumanError {
        message: message.into(),
        suggestion,
        retriable,
        severity,
        stage: None,
    };

    match err {
        RichtwerkError::InvalidInput(detail) => plain(
            "This image can't be processed.",
            format!("The picture looks empty or malformed. Check the file opens in an image viewer. ({detail})"),
            false,
            Severity::Permanent,
        ),

        RichtwerkError::ResourceExhaustion { required, limit } => plain(
            "This image is too large to process.",
            format!(
                "It needs about {} MiB of working memory but the limit is {} MiB. Scan at a lower resolution or raise limits.max_buffer_bytes.",
                required / (1024 * 1024),
                limit / (1024 * 1024)
            ),
            false,
            Severity::ActionRequired,
        ),

        RichtwerkError::Image(detail) => humanize_image_error(detail),

        RichtwerkError::Timeout { elapsed_ms } => plain(
            "Processing took too long.",
            format!(
                "The document was abandoned after {:.1} s. Try again with fewer documents at once or a longer timeout.",
                *elapsed_ms as f64 / 1000.0
            ),
            true,
            Severity::Transient,
        ),

        RichtwerkError::TaskJoin(_) => plain(
            "A worker stopped unexpectedly.",
            "Try again. If this keeps happening with the same file, please report it.".into(),
            true,
            Severity::Transient,
        ),

        RichtwerkError::InvalidTransition { .. } => plain(
            "Richtwerk hit an internal ordering problem.",
            "This is a bug. Please report it together with the input file.".into(),
            false,
            Severity::Permanent,
        ),

        RichtwerkError::Config(detail) => plain(
            "The configuration file has a bad value.",
            format!("Fix the setting and run again. ({detail})"),
            false,
            Severity::ActionRequired,
        ),

        RichtwerkError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => plain(
                "The file couldn't be found.",
                "It may have been moved or deleted. Check the path and try again.".into(),
                false,
                Severity::ActionRequired,
            ),
            std::io::ErrorKind::PermissionDenied => plain(
                "Richtwerk doesn't have permission to use that file.",
                "Check the file and output directory permissions.".into(),
                false,
                Severity::ActionRequired,
            ),
            _ => plain(
                "There was a problem reading or writing a file.",
                "Try again. If this keeps happening, the disk may be full.".into(),
                true,
                Severity::Transient,
            ),
        },

        RichtwerkError::Serialization(_) => plain(
            "A settings or report file couldn't be read or written.",
            "Check that the file is valid JSON.".into(),
            false,
            Severity::ActionRequired,
        ),

        // `root()` never returns a stage wrapper; kept for exhaustiveness.
        RichtwerkError::StageFailed { source, .. } => humanize_root(source),
    }
}

/// Codec failures: split unsupported formats from damaged files.
fn humanize_image_error(detail: &str) -> HumanError {
    let lower = detail.to_ascii_lowercase();

    let (message, suggestion, severity) = if lower.contains("unsupported") || lower.contains("format") {
        (
            "This image format isn't supported.",
            "Save the scan as PNG, JPEG or TIFF and try again.",
            Severity::ActionRequired,
        )
    } else if lower.contains("encode") {
        (
            "The corrected image couldn't be saved.",
            "Try a different output format.",
            Severity::ActionRequired,
        )
    } else {
        (
            "There's a problem with this image.",
            "The file may be damaged. Try opening it in an image viewer or scanning it again.",
            Severity::Permanent,
        )
    };

    HumanError {
        message: message.into(),
        suggestion: format!("{suggestion} ({detail})"),
        retriable: false,
        severity,
        stage: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_transient() {
        let human = humanize_error(&RichtwerkError::Timeout { elapsed_ms: 120_000 });
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
        assert!(human.suggestion.contains("120.0 s"), "{}", human.suggestion);
    }

    /// The reason describes the root cause and remembers the stage.
    #[test]
    fn stage_wrapper_is_looked_through() {
        let err = RichtwerkError::InvalidInput("zero height".into()).in_stage(PipelineState::Loaded, 0.1);
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Permanent);
        assert_eq!(human.stage, Some(PipelineState::Loaded));
        assert!(human.suggestion.contains("zero height"));
    }

    #[test]
    fn oversized_input_is_action_required() {
        let err = RichtwerkError::ResourceExhaustion {
            required: 900 * 1024 * 1024,
            limit: 512 * 1024 * 1024,
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.suggestion.contains("900 MiB"));
    }

    #[test]
    fn unsupported_format_is_action_required() {
        let human = humanize_error(&RichtwerkError::Image("decode: unsupported format WebP".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
    }

    #[test]
    fn missing_file_is_action_required() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "scan.png");
        let human = humanize_error(&RichtwerkError::Io(io));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert_eq!(human.stage, None);
    }
}
