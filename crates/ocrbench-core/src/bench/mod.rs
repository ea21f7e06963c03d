//! Benchmark orchestration.

mod runner;

pub use runner::{BenchmarkRunner, RunOutcome};

use std::fmt;
use std::path::{Path, PathBuf};

use crate::models::record::BenchmarkRecord;

/// Phases of a benchmark run, in the order they are entered.
///
/// `LoadingEngine`, `Extracting` and `Scoring` repeat per engine and
/// document; loading is skipped once an engine is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    LoadingEngine,
    Extracting,
    Scoring,
    Aggregating,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::LoadingEngine => "loading_engine",
            Self::Extracting => "extracting",
            Self::Scoring => "scoring",
            Self::Aggregating => "aggregating",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// What a run processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunInput {
    /// One document; the results file holds a single entry.
    Document(PathBuf),
    /// Every matching document in a directory.
    Dataset(PathBuf),
}

impl RunInput {
    pub fn path(&self) -> &Path {
        match self {
            Self::Document(path) | Self::Dataset(path) => path,
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Self::Document(_))
    }
}

/// Per-run settings that are not part of the configuration file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Engines to run, in order.
    pub engines: Vec<String>,
    pub max_documents: Option<usize>,
    /// Requested batch size, used for device selection.
    pub batch_size: usize,
    /// Final results path; interim snapshots are written next to it.
    pub output: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            engines: crate::ocr::EngineKind::ALL.iter().map(|k| k.as_str().to_string()).collect(),
            max_documents: None,
            batch_size: 1,
            output: None,
        }
    }
}

/// Live progress hooks. All methods default to no-ops.
pub trait RunObserver {
    /// A document is about to be processed (`index` is zero-based).
    fn on_document_start(&mut self, _index: usize, _total: usize, _document: &Path) {}

    /// One engine finished one document.
    fn on_record(&mut self, _record: &BenchmarkRecord) {}

    /// An interim snapshot was written.
    fn on_snapshot(&mut self, _path: &Path) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl RunObserver for NoopObserver {}
