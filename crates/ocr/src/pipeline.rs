use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::clean::clean_text;
use crate::config::PipelineConfig;
use crate::extract::Extractor;
use crate::preprocess::{self, PreprocessError};
use crate::recognizer::{OcrBackend, OcrError};
use crate::refine::Refiner;
use crate::types::ScanRecord;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
}

impl PipelineError {
    /// Stable tag for serialized error indicators.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Preprocess(PreprocessError::Config(_)) => "config",
            PipelineError::Io(_) | PipelineError::Preprocess(_) => "image_read",
            PipelineError::Ocr(e) => e.kind(),
        }
    }
}

/// Envelope for callers that must never crash on a bad document: either the
/// assembled record or a tagged error indicator, both JSON-serializable.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ScanOutcome {
    Success(ScanRecord),
    Failure { error: ErrorIndicator },
}

#[derive(Debug, Serialize)]
pub struct ErrorIndicator {
    pub kind: &'static str,
    pub message: String,
}

impl ScanOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScanOutcome::Success(_))
    }
}

impl From<Result<ScanRecord, PipelineError>> for ScanOutcome {
    fn from(result: Result<ScanRecord, PipelineError>) -> Self {
        match result {
            Ok(record) => ScanOutcome::Success(record),
            Err(e) => ScanOutcome::Failure {
                error: ErrorIndicator {
                    kind: e.kind(),
                    message: e.to_string(),
                },
            },
        }
    }
}

/// Orchestrates: preprocess → OCR → clean → extract → (best-effort) refine →
/// assemble. One instance serves any number of documents; nothing is shared
/// between scans.
pub struct CardPipeline<R: OcrBackend> {
    recognizer: R,
    config: PipelineConfig,
    refiner: Option<Box<dyn Refiner>>,
}

impl<R: OcrBackend> CardPipeline<R> {
    pub fn new(recognizer: R, config: PipelineConfig) -> Self {
        Self {
            recognizer,
            config,
            refiner: None,
        }
    }

    /// Attach a refinement collaborator. Its failures downgrade to a log line
    /// and an absent `improved_fields`, never a failed scan.
    pub fn with_refiner(mut self, refiner: Box<dyn Refiner>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    /// Process an image file on disk.
    pub async fn process_file(&self, path: &Path) -> Result<ScanRecord, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");
        self.process_bytes(&bytes, name).await
    }

    /// Process raw image bytes (camera capture or a prior file read).
    pub async fn process_bytes(
        &self,
        data: &[u8],
        source_name: &str,
    ) -> Result<ScanRecord, PipelineError> {
        let prepared = preprocess::prepare_for_ocr_from_bytes(data, &self.config.preprocess)?;
        tracing::debug!(
            source = source_name,
            width = prepared.width,
            height = prepared.height,
            "image preprocessed"
        );

        let raw_text = self
            .recognizer
            .recognize(&prepared.png, &self.config.languages)
            .await?;
        let cleaned_text = clean_text(&raw_text);
        let fields = Extractor::new(self.config.number_rule).extract(&cleaned_text);
        tracing::debug!(source = source_name, fields = fields.len(), "fields extracted");

        let improved_fields = match &self.refiner {
            Some(refiner) => match refiner.refine(&cleaned_text, &fields).await {
                Ok(reply) => Some(reply),
                Err(e) => {
                    tracing::warn!(source = source_name, error = %e, "refinement failed, keeping raw fields");
                    None
                }
            },
            None => None,
        };

        Ok(ScanRecord {
            original_file_name: source_name.to_string(),
            size_kb: prepared.buffer_kb(),
            processed_at: Utc::now(),
            raw_text,
            cleaned_text,
            fields,
            improved_fields,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
