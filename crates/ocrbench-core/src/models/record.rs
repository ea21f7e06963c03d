//! Benchmark records and their persisted per-document grouping.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::fields::StructuredFields;
use crate::ocr::{Device, ExtractionResult, TextLine};
use crate::scoring::QualityScore;

/// A successful extraction, scored and parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSuccess {
    pub raw_text: String,
    pub processing_time: f64,
    /// Native mean confidence when available, heuristic score otherwise.
    pub confidence: f64,
    pub lines_count: usize,
    pub characters_count: usize,
    pub words_count: usize,
    pub quality: QualityScore,
    #[serde(default)]
    pub fields: StructuredFields,
    pub device: Device,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<TextLine>>,
}

impl EngineSuccess {
    pub fn new(
        result: &ExtractionResult,
        quality: QualityScore,
        fields: StructuredFields,
        include_geometry: bool,
    ) -> Self {
        Self {
            raw_text: result.raw_text(),
            processing_time: result.processing_time(),
            confidence: quality.score,
            lines_count: result.lines_count(),
            characters_count: result.characters_count(),
            words_count: result.words_count(),
            quality,
            fields,
            device: result.device(),
            lines: include_geometry.then(|| result.lines().to_vec()),
        }
    }
}

/// A failed extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineFailure {
    pub error: String,
    pub error_kind: String,
    pub processing_time: f64,
}

impl EngineFailure {
    pub fn new(error: &EngineError, processing_time: f64) -> Self {
        Self {
            error: error.to_string(),
            error_kind: error.kind().to_string(),
            processing_time: processing_time.max(0.0),
        }
    }
}

/// Outcome of one engine on one document, as it appears under `models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EngineOutcome {
    Success(Box<EngineSuccess>),
    Failure(EngineFailure),
}

impl EngineOutcome {
    pub fn success(&self) -> Option<&EngineSuccess> {
        match self {
            Self::Success(success) => Some(success.as_ref()),
            Self::Failure(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn processing_time(&self) -> f64 {
        match self {
            Self::Success(success) => success.processing_time,
            Self::Failure(failure) => failure.processing_time,
        }
    }
}

/// One document processed by one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub document: PathBuf,
    pub engine: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: EngineOutcome,
}

impl BenchmarkRecord {
    pub fn new(document: &Path, engine: impl Into<String>, outcome: EngineOutcome) -> Self {
        Self {
            document: document.to_path_buf(),
            engine: engine.into(),
            timestamp: Utc::now(),
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// All engine outcomes for one document: the persisted entry shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub image_path: String,
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "extractors")]
    pub models: IndexMap<String, EngineOutcome>,
}

impl DocumentReport {
    /// Split back into records, one per engine, in engine order.
    pub fn records(&self) -> Vec<BenchmarkRecord> {
        self.models
            .iter()
            .map(|(engine, outcome)| BenchmarkRecord {
                document: PathBuf::from(&self.image_path),
                engine: engine.clone(),
                timestamp: self.timestamp,
                outcome: outcome.clone(),
            })
            .collect()
    }
}

/// Group records by document, keeping first-seen document and engine order.
///
/// The entry timestamp is the document's first record. A repeated
/// (document, engine) pair keeps the later outcome.
pub fn group_by_document(records: &[BenchmarkRecord]) -> Vec<DocumentReport> {
    let mut grouped: IndexMap<&Path, DocumentReport> = IndexMap::new();

    for record in records {
        let entry = grouped
            .entry(record.document.as_path())
            .or_insert_with(|| DocumentReport {
                image_path: record.document.display().to_string(),
                timestamp: record.timestamp,
                models: IndexMap::new(),
            });
        entry.models.insert(record.engine.clone(), record.outcome.clone());
    }

    grouped.into_values().collect()
}

/// Flatten document entries back into records.
pub fn flatten_reports(reports: &[DocumentReport]) -> Vec<BenchmarkRecord> {
    reports.iter().flat_map(|r| r.records()).collect()
}
