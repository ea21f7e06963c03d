//! Core library for benchmarking OCR engines on legal documents.
//!
//! This crate provides:
//! - Extractor adapters for DocTR, PaddleOCR, GOT-OCR2 and SmolVLM behind one trait
//! - Document loading with first-page PDF rasterization
//! - Heuristic quality scoring and HIGH/MEDIUM/LOW/ERROR tiering
//! - Regex field extraction with first-match-wins precedence
//! - A sequential benchmark runner with interim snapshots
//! - Per-engine aggregate statistics and JSON/Markdown/CSV reports

pub mod bench;
pub mod document;
pub mod error;
pub mod fields;
pub mod models;
pub mod ocr;
pub mod output;
pub mod report;
pub mod scoring;

pub use bench::{BenchmarkRunner, NoopObserver, RunInput, RunObserver, RunOptions, RunOutcome, RunPhase};
pub use error::{BenchError, EngineError, Result};
pub use fields::{FieldExtractor, FieldName, FieldRule, StructuredFields};
pub use models::config::BenchConfig;
pub use models::record::{BenchmarkRecord, DocumentReport, EngineFailure, EngineOutcome, EngineSuccess};
pub use ocr::{Device, EngineKind, EngineRegistry, ExtractionResult, Extractor, TextLine};
pub use report::{BatchSummary, EngineSummary, summarize};
pub use scoring::{QualityScore, QualityScorer, QualityTier};
