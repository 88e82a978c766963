// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Concurrent batch normalisation.
//
// Documents are independent: each one gets its own pipeline run on the
// blocking pool. A semaphore caps how many runs hold input bytes or pixel
// buffers at once and every document has a wall-clock timeout.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use richtwerk_core::config::PipelineConfig;
use richtwerk_core::error::{Result, RichtwerkError};
use richtwerk_core::types::PipelineState;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::codec::RasterCodec;
use crate::pipeline::{DocumentPipeline, NormalizationResult};
use crate::structure::{LineBandAnalyzer, StructuralAnalyzer};

/// One document to normalise.
#[derive(Debug, Clone)]
pub enum BatchInput {
    /// An image file on disk.
    Path(PathBuf),
    /// Encoded image bytes with a display name.
    Bytes { name: String, data: Vec<u8> },
}

impl BatchInput {
    pub fn label(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes { name, .. } => name.clone(),
        }
    }
}

/// Digest of the encoded input bytes, recorded alongside each outcome.
pub type Fingerprint = Arc<dyn Fn(&[u8]) -> String + Send + Sync>;

/// Result for one input, in input order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub input: String,
    /// Digest of the bytes that were decoded; absent without a fingerprint
    /// function or when the input could not be read.
    pub fingerprint: Option<String>,
    pub result: Result<NormalizationResult>,
}

/// Runs many documents with bounded concurrency.
#[derive(Clone)]
pub struct BatchRunner {
    config: Arc<PipelineConfig>,
    codec: Arc<dyn RasterCodec>,
    analyzer: Arc<dyn StructuralAnalyzer>,
    fingerprint: Option<Fingerprint>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    timeout: Duration,
}

impl BatchRunner {
    /// Concurrency and timeout come from `config.limits`.
    pub fn new(config: PipelineConfig, codec: Arc<dyn RasterCodec>) -> Result<Self> {
        config.validate()?;
        let concurrency = config.limits.max_concurrent_documents;
        let timeout = Duration::from_secs(config.limits.document_timeout_secs);
        Ok(Self {
            config: Arc::new(config),
            codec,
            analyzer: Arc::new(LineBandAnalyzer::default()),
            fingerprint: None,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            timeout,
        })
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn StructuralAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Digest every input's bytes once they are read.
    pub fn with_fingerprint(mut self, fingerprint: impl Fn(&[u8]) -> String + Send + Sync + 'static) -> Self {
        self.fingerprint = Some(Arc::new(fingerprint));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(RichtwerkError::Config("concurrency must be at least 1".into()));
        }
        self.semaphore = Arc::new(Semaphore::new(concurrency));
        self.concurrency = concurrency;
        Ok(self)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Normalise every input. Failures are reported per document and never
    /// abort the rest of the batch.
    #[instrument(skip_all, fields(documents = inputs.len(), concurrency = self.concurrency))]
    pub async fn run(&self, inputs: Vec<BatchInput>) -> Vec<BatchOutcome> {
        let handles: Vec<_> = inputs
            .into_iter()
            .map(|input| {
                let runner = self.clone();
                let label = input.label();
                (label, tokio::spawn(async move { runner.run_one(input).await }))
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (input, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => BatchOutcome {
                    input,
                    fingerprint: None,
                    result: Err(RichtwerkError::TaskJoin(err.to_string())),
                },
            };
            if let Err(err) = &outcome.result {
                warn!(input = %outcome.input, error = %err, "Document failed");
            }
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(total = outcomes.len(), failed, "Batch finished");
        outcomes
    }

    /// Normalise a single input under the concurrency limit and timeout.
    /// Path inputs are read only once a slot is free.
    pub async fn run_one(&self, input: BatchInput) -> BatchOutcome {
        let label = input.label();
        let digest = Arc::new(OnceLock::new());
        let result = self.normalize_bounded(input, Arc::clone(&digest)).await;
        BatchOutcome {
            input: label,
            fingerprint: digest.get().cloned(),
            result,
        }
    }

    async fn normalize_bounded(&self, input: BatchInput, digest: Arc<OnceLock<String>>) -> Result<NormalizationResult> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|err| RichtwerkError::TaskJoin(err.to_string()))?;
        let started = Instant::now();

        let config = Arc::clone(&self.config);
        let codec = Arc::clone(&self.codec);
        let analyzer = Arc::clone(&self.analyzer);
        let fingerprint = self.fingerprint.clone();
        // The permit moves into the blocking task so a timed-out run keeps its
        // slot until its pixels are released.
        let work = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let data = load(input, started)?;
            if let Some(fingerprint) = &fingerprint {
                let _ = digest.set(fingerprint(&data));
            }
            normalize(&config, codec.as_ref(), analyzer, &data)
        });

        match tokio::time::timeout(self.timeout, work).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(RichtwerkError::TaskJoin(join.to_string())),
            Err(_) => Err(RichtwerkError::Timeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
        }
    }
}

/// Encoded bytes of `input`; read failures belong to the `Loaded` stage.
fn load(input: BatchInput, started: Instant) -> Result<Vec<u8>> {
    match input {
        BatchInput::Path(path) => std::fs::read(&path).map_err(|err| {
            RichtwerkError::from(err).in_stage(PipelineState::Loaded, started.elapsed().as_secs_f64() * 1000.0)
        }),
        BatchInput::Bytes { data, .. } => Ok(data),
    }
}

fn normalize(
    config: &PipelineConfig,
    codec: &dyn RasterCodec,
    analyzer: Arc<dyn StructuralAnalyzer>,
    data: &[u8],
) -> Result<NormalizationResult> {
    let started = Instant::now();
    let raster = codec.decode_bytes(data).map_err(|err| {
        err.in_stage(PipelineState::Loaded, started.elapsed().as_secs_f64() * 1000.0)
    })?;
    DocumentPipeline::new(config, codec)?
        .with_analyzer(analyzer)
        .run(raster)
}
