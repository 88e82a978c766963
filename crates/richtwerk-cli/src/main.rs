// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Richtwerk: scanned business-document normaliser.
//
// Entry point. Initialises logging, loads the pipeline configuration, runs the
// inputs through the batch runner and writes corrected images plus JSON
// reports into the output directory.

mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use richtwerk_core::error::{Result, RichtwerkError};
use richtwerk_core::{OutputFormat, PipelineConfig};
use richtwerk_core::human_errors::humanize_error;
use richtwerk_imaging::{BatchInput, BatchRunner, ImageCodec, RasterCodec};
use tracing::{error, info, warn};

use output::{OutputTarget, fingerprint};

/// Normalise scanned or photographed business documents: denoise, find the
/// page outline, correct perspective and skew, score quality.
#[derive(Debug, Parser)]
#[command(name = "richtwerk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Image files to normalise
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for corrected images and reports
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Pipeline configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Documents processed at the same time (overrides the config)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-document timeout in seconds (overrides the config)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Output encoding: png, jpg or tiff (overrides the config)
    #[arg(long, value_parser = parse_format)]
    format: Option<OutputFormat>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Load the configuration file, if any, and apply flag overrides.
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(concurrency) = self.concurrency {
            config.limits.max_concurrent_documents = concurrency;
        }
        if let Some(timeout) = self.timeout_secs {
            config.limits.document_timeout_secs = timeout;
        }
        if let Some(format) = self.format {
            config.output_format = format;
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_format(value: &str) -> std::result::Result<OutputFormat, String> {
    OutputFormat::from_extension(value.trim_start_matches('.'))
        .ok_or_else(|| format!("unsupported output format `{value}` (expected png, jpg or tiff)"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let fallback = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .init();

    match run(cli).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            warn!(failed, "Some documents could not be normalised");
            ExitCode::from(1)
        }
        Err(err) => {
            let human = humanize_error(&err);
            error!(error = %err, suggestion = %human.suggestion, "{}", human.message);
            ExitCode::from(2)
        }
    }
}

/// Process every input; returns the number of failed documents.
async fn run(cli: Cli) -> Result<usize> {
    let config = cli.pipeline_config()?;
    let format = config.output_format;
    tokio::fs::create_dir_all(&cli.output_dir).await?;
    info!(
        documents = cli.inputs.len(),
        concurrency = config.limits.max_concurrent_documents,
        timeout_secs = config.limits.document_timeout_secs,
        "Richtwerk starting"
    );

    let codec = Arc::new(ImageCodec::new());
    let runner = BatchRunner::new(config.clone(), codec.clone())?.with_fingerprint(fingerprint);

    let targets = OutputTarget::for_inputs(&cli.output_dir, &cli.inputs);
    let inputs = cli.inputs.iter().cloned().map(BatchInput::Path).collect();
    let outcomes = runner.run(inputs).await;

    let mut failed = 0;
    for (target, outcome) in targets.iter().zip(outcomes) {
        let sha = outcome.fingerprint.as_deref();
        match outcome.result {
            Ok(result) => {
                let codec: &dyn RasterCodec = codec.as_ref();
                if let Err(err) = target.write_success(&outcome.input, sha, &result, codec, format).await {
                    failed += 1;
                    report_failure(target, &outcome.input, sha, &err).await?;
                }
            }
            Err(err) => {
                failed += 1;
                report_failure(target, &outcome.input, sha, &err).await?;
            }
        }
    }

    info!(total = cli.inputs.len(), failed, "Richtwerk finished");
    Ok(failed)
}

async fn report_failure(target: &OutputTarget, source: &str, sha: Option<&str>, err: &RichtwerkError) -> Result<()> {
    let reason = target.write_failure(source, sha, err).await?;
    error!(
        source,
        stage = ?reason.stage,
        severity = ?reason.severity,
        suggestion = %reason.suggestion,
        "{}",
        reason.message
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "richtwerk",
            "--concurrency",
            "2",
            "--timeout-secs",
            "30",
            "--format",
            "JPEG",
            "a.png",
            "b.jpg",
        ])
        .expect("parse");
        assert_eq!(cli.inputs.len(), 2);

        let config = cli.pipeline_config().expect("config");
        assert_eq!(config.limits.max_concurrent_documents, 2);
        assert_eq!(config.limits.document_timeout_secs, 30);
        assert_eq!(config.output_format, OutputFormat::Jpeg { quality: 90 });
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["richtwerk", "--format", "bmp", "a.png"]).is_err());
    }

    #[test]
    fn inputs_are_required() {
        assert!(Cli::try_parse_from(["richtwerk"]).is_err());
    }

    #[test]
    fn zero_concurrency_is_a_config_error() {
        let cli = Cli::try_parse_from(["richtwerk", "--concurrency", "0", "a.png"]).expect("parse");
        assert!(matches!(cli.pipeline_config(), Err(RichtwerkError::Config(_))));
    }

    /// A readable and an unreadable input: one normalised image, two reports.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_writes_images_and_reports() {
        let dir = tempfile::tempdir().expect("tempdir");
        let codec = ImageCodec::new();
        let raster = richtwerk_imaging::RasterBuffer::filled(48, 32, [230, 230, 230]).expect("raster");
        let input = dir.path().join("page.png");
        std::fs::write(&input, codec.encode(&raster, richtwerk_core::OutputFormat::Png).expect("encode"))
            .expect("write");
        let out = dir.path().join("out");

        let cli = Cli {
            inputs: vec![input, dir.path().join("absent.png")],
            output_dir: out.clone(),
            config: None,
            concurrency: Some(1),
            timeout_secs: Some(30),
            format: None,
            verbose: false,
        };
        let failed = run(cli).await.expect("run");

        assert_eq!(failed, 1);
        assert!(out.join("page.normalized.png").exists());
        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("page.report.json")).expect("read"))
                .expect("json");
        assert_eq!(report["status"], "normalized");
        assert_eq!(report["input_sha256"].as_str().map(str::len), Some(64));
        let missing: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("absent.report.json")).expect("read"))
                .expect("json");
        assert_eq!(missing["status"], "failed");
        assert!(missing.get("input_sha256").is_none());
    }

    /// Two inputs named alike in different directories both get reports.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn same_named_inputs_do_not_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let codec = ImageCodec::new();
        let mut inputs = Vec::new();
        for (sub, shade) in [("a", 230u8), ("b", 120u8)] {
            let raster = richtwerk_imaging::RasterBuffer::filled(48, 32, [shade; 3]).expect("raster");
            std::fs::create_dir_all(dir.path().join(sub)).expect("mkdir");
            let path = dir.path().join(sub).join("page.png");
            std::fs::write(&path, codec.encode(&raster, OutputFormat::Png).expect("encode")).expect("write");
            inputs.push(path);
        }
        let out = dir.path().join("out");

        let cli = Cli {
            inputs: inputs.clone(),
            output_dir: out.clone(),
            config: None,
            concurrency: Some(2),
            timeout_secs: Some(30),
            format: None,
            verbose: false,
        };
        assert_eq!(run(cli).await.expect("run"), 0);

        for (stem, input) in [("page", &inputs[0]), ("page-2", &inputs[1])] {
            assert!(out.join(format!("{stem}.normalized.png")).exists());
            let report: serde_json::Value = serde_json::from_str(
                &std::fs::read_to_string(out.join(format!("{stem}.report.json"))).expect("read"),
            )
            .expect("json");
            assert_eq!(report["source"], input.display().to_string());
            let bytes = std::fs::read(input).expect("read input");
            assert_eq!(report["input_sha256"], fingerprint(&bytes));
        }
    }
}
