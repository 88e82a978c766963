// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Writing normalised images and JSON reports next to each other.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use richtwerk_core::error::{Result, RichtwerkError};
use richtwerk_core::human_errors::{HumanError, humanize_error};
use richtwerk_core::types::OutputFormat;
use richtwerk_imaging::{NormalizationReport, NormalizationResult, RasterCodec};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

/// Lowercase hex SHA-256 of `data`.
pub fn fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// File stem used for every artefact derived from `input`.
pub fn output_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "document".to_owned())
}

#[derive(Debug, Serialize)]
struct DocumentReport<'a> {
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_sha256: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(flatten)]
    outcome: Outcome<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Outcome<'a> {
    Normalized(NormalizationReport),
    Failed {
        error: String,
        reason: &'a HumanError,
    },
}

/// Where one document's artefacts go.
#[derive(Debug, Clone)]
pub struct OutputTarget {
    pub dir: PathBuf,
    pub stem: String,
}

impl OutputTarget {
    pub fn new(dir: &Path, input: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            stem: output_stem(input),
        }
    }

    /// One target per input, in order. Inputs sharing a stem get `-2`,
    /// `-3`, ... so no two documents write the same files; stems are
    /// compared case-insensitively.
    pub fn for_inputs(dir: &Path, inputs: &[PathBuf]) -> Vec<Self> {
        let mut taken = HashSet::new();
        inputs
            .iter()
            .map(|input| {
                let mut target = Self::new(dir, input);
                let base = target.stem.clone();
                let mut suffix = 2;
                while !taken.insert(target.stem.to_lowercase()) {
                    target.stem = format!("{base}-{suffix}");
                    suffix += 1;
                }
                target
            })
            .collect()
    }

    pub fn image_path(&self, format: OutputFormat) -> PathBuf {
        self.dir.join(format!("{}.normalized.{}", self.stem, format.extension()))
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(format!("{}.report.json", self.stem))
    }

    /// Encode the corrected raster and write it with its report.
    pub async fn write_success(
        &self,
        source: &str,
        input_sha256: Option<&str>,
        result: &NormalizationResult,
        codec: &dyn RasterCodec,
        format: OutputFormat,
    ) -> Result<PathBuf> {
        let image_path = self.image_path(format);
        let encoded = codec.encode(&result.raster, format)?;
        tokio::fs::write(&image_path, encoded).await?;

        let report = DocumentReport {
            source,
            input_sha256,
            output: Some(image_path.display().to_string()),
            outcome: Outcome::Normalized(result.report()),
        };
        self.write_report(&report).await?;
        info!(
            source,
            output = %image_path.display(),
            quality_before = result.input_metrics.overall,
            quality_after = result.output_metrics.overall,
            "Document written"
        );
        Ok(image_path)
    }

    /// Write a failure report carrying the plain-language reason.
    pub async fn write_failure(
        &self,
        source: &str,
        input_sha256: Option<&str>,
        err: &RichtwerkError,
    ) -> Result<HumanError> {
        let reason = humanize_error(err);
        let report = DocumentReport {
            source,
            input_sha256,
            output: None,
            outcome: Outcome::Failed {
                error: err.to_string(),
                reason: &reason,
            },
        };
        self.write_report(&report).await?;
        Ok(reason)
    }

    async fn write_report(&self, report: &DocumentReport<'_>) -> Result<()> {
        let json = serde_json::to_vec_pretty(report)?;
        tokio::fs::write(self.report_path(), json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_sha256_hex() {
        assert_eq!(
            fingerprint(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn stems_and_paths() {
        let target = OutputTarget::new(Path::new("/out"), Path::new("/in/invoice-07.jpg"));
        assert_eq!(target.stem, "invoice-07");
        assert_eq!(target.image_path(OutputFormat::Png), PathBuf::from("/out/invoice-07.normalized.png"));
        assert_eq!(target.report_path(), PathBuf::from("/out/invoice-07.report.json"));
        assert_eq!(output_stem(Path::new("/")), "document");
    }

    /// Same-named files from different directories keep separate artefacts.
    #[test]
    fn clashing_stems_are_numbered() {
        let inputs = [
            PathBuf::from("a/page.png"),
            PathBuf::from("b/page.png"),
            PathBuf::from("c/page-2.jpg"),
            PathBuf::from("d/Page.tiff"),
            PathBuf::from("e/invoice.png"),
        ];
        let targets = OutputTarget::for_inputs(Path::new("/out"), &inputs);
        let stems: Vec<_> = targets.iter().map(|t| t.stem.as_str()).collect();
        assert_eq!(stems, vec!["page", "page-2", "page-2-2", "Page-3", "invoice"]);

        let reports: HashSet<_> = targets.iter().map(OutputTarget::report_path).collect();
        assert_eq!(reports.len(), inputs.len());
    }

    /// A failure report names the status, the raw error and the reason.
    #[tokio::test]
    async fn failure_report_is_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = OutputTarget::new(dir.path(), Path::new("scan.png"));
        let err = RichtwerkError::Timeout { elapsed_ms: 2_000 };

        let reason = target.write_failure("scan.png", Some("00ff"), &err).await.expect("write");
        assert!(reason.retriable);

        let written = std::fs::read_to_string(target.report_path()).expect("read");
        let json: serde_json::Value = serde_json::from_str(&written).expect("json");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["input_sha256"], "00ff");
        assert_eq!(json["reason"]["severity"], "transient");
        assert!(json.get("output").is_none());
    }
}
