//! The benchmark loop: documents outer, engines inner, one at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{RunInput, RunObserver, RunOptions, RunPhase};
use crate::document::discover_documents;
use crate::error::{BenchError, Result};
use crate::fields::FieldExtractor;
use crate::models::config::BenchConfig;
use crate::models::record::{
    BenchmarkRecord, DocumentReport, EngineFailure, EngineOutcome, EngineSuccess, group_by_document,
};
use crate::ocr::{Device, EngineRegistry, canonical_name, select_device};
use crate::output;
use crate::report::{BatchSummary, summarize};
use crate::scoring::QualityScorer;

/// Everything a finished (or cancelled) run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Records in processing order.
    pub records: Vec<BenchmarkRecord>,
    /// Documents that were fully processed.
    pub documents: Vec<PathBuf>,
    /// Documents that were selected for the run.
    pub planned: usize,
    pub cancelled: bool,
    pub summary: BatchSummary,
}

impl RunOutcome {
    /// Records grouped into persisted document entries.
    pub fn reports(&self) -> Vec<DocumentReport> {
        group_by_document(&self.records)
    }
}

/// Runs engines over documents and collects scored records.
pub struct BenchmarkRunner {
    config: BenchConfig,
    registry: EngineRegistry,
    scorer: QualityScorer,
    fields: FieldExtractor,
    cancel: Arc<AtomicBool>,
    phase: RunPhase,
}

impl BenchmarkRunner {
    /// Runner with engines resolved from `config`.
    pub fn new(config: BenchConfig) -> Self {
        let registry = EngineRegistry::from_config(&config);
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: BenchConfig, registry: EngineRegistry) -> Self {
        Self {
            scorer: QualityScorer::new(config.scoring.clone()),
            fields: FieldExtractor::new(),
            config,
            registry,
            cancel: Arc::new(AtomicBool::new(false)),
            phase: RunPhase::Init,
        }
    }

    /// Replace the default field rules.
    pub fn with_field_extractor(mut self, fields: FieldExtractor) -> Self {
        self.fields = fields;
        self
    }

    pub fn registry_mut(&mut self) -> &mut EngineRegistry {
        &mut self.registry
    }

    /// Flag checked between documents; setting it stops the run after the
    /// current document.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Documents a run over `input` would process.
    pub fn resolve_documents(&self, input: &RunInput, max_documents: Option<usize>) -> Result<Vec<PathBuf>> {
        match input {
            RunInput::Document(path) => {
                if !path.is_file() {
                    return Err(BenchError::Config(format!("document not found: {}", path.display())));
                }
                Ok(vec![path.clone()])
            }
            RunInput::Dataset(dir) => {
                if !dir.exists() {
                    return Err(BenchError::Config(format!("dataset not found: {}", dir.display())));
                }
                discover_documents(dir, &self.config.run.extensions, max_documents)
            }
        }
    }

    /// Run every requested engine over every document of `input`.
    ///
    /// Only input errors are returned; engine failures become records.
    pub async fn run(
        &mut self,
        input: &RunInput,
        options: &RunOptions,
        observer: &mut dyn RunObserver,
    ) -> Result<RunOutcome> {
        self.set_phase(RunPhase::Init);
        let documents = self.resolve_documents(input, options.max_documents)?;
        let engines: Vec<String> = options.engines.iter().map(|e| canonical_name(e)).collect();

        info!(
            "Benchmarking {} documents with {} engines: {}",
            documents.len(),
            engines.len(),
            engines.join(", ")
        );

        let snapshot_every = self.config.run.snapshot_every;
        let mut records = Vec::with_capacity(documents.len() * engines.len());
        let mut processed = Vec::with_capacity(documents.len());
        let mut cancelled = false;

        for (index, document) in documents.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                warn!("Run cancelled after {} of {} documents", index, documents.len());
                cancelled = true;
                break;
            }

            observer.on_document_start(index, documents.len(), document);
            let device = select_device(options.batch_size, &self.config.engines.device);
            debug!("Document {}/{}: {} on {}", index + 1, documents.len(), document.display(), device.as_str());

            for engine in &engines {
                let record = self.run_engine(document, engine, device).await;
                observer.on_record(&record);
                records.push(record);
            }
            processed.push(document.clone());

            let done = index + 1;
            if snapshot_every > 0 && done % snapshot_every == 0 && done < documents.len() {
                if let Some(output_path) = &options.output {
                    let path = output::snapshot_path(output_path, done);
                    match output::write_json(&group_by_document(&records), &path) {
                        Ok(()) => {
                            info!("Wrote interim snapshot {}", path.display());
                            observer.on_snapshot(&path);
                        }
                        Err(e) => warn!("Failed to write snapshot {}: {}", path.display(), e),
                    }
                }
            }
        }

        self.set_phase(RunPhase::Aggregating);
        let summary = summarize(&records);
        self.set_phase(RunPhase::Done);

        Ok(RunOutcome {
            records,
            documents: processed,
            planned: documents.len(),
            cancelled,
            summary,
        })
    }

    /// One engine on one document. Never fails: errors become failure records.
    pub async fn run_engine(&mut self, document: &Path, engine: &str, device: Device) -> BenchmarkRecord {
        if !self.registry.is_loaded(engine) {
            self.set_phase(RunPhase::LoadingEngine);
        }
        self.set_phase(RunPhase::Extracting);

        let start = Instant::now();
        let extracted = self.registry.get(engine).extract(document, device).await;
        let elapsed = start.elapsed().as_secs_f64();

        let outcome = match extracted {
            Ok(result) => {
                self.set_phase(RunPhase::Scoring);
                let quality = self.scorer.assess(&result);
                let fields = self.fields.extract(&result.raw_text());
                debug!(
                    "{} on {}: {} lines, score {:.1} ({}), {} fields",
                    engine,
                    document.display(),
                    result.lines_count(),
                    quality.score,
                    quality.tier.as_str(),
                    fields.len()
                );
                EngineOutcome::Success(Box::new(EngineSuccess::new(
                    &result,
                    quality,
                    fields,
                    self.config.run.include_geometry,
                )))
            }
            Err(e) => {
                warn!("{} failed on {}: {}", engine, document.display(), e);
                EngineOutcome::Failure(EngineFailure::new(&e, elapsed))
            }
        };

        BenchmarkRecord::new(document, engine, outcome)
    }

    fn set_phase(&mut self, phase: RunPhase) {
        if self.phase != phase {
            debug!("Run phase: {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::NoopObserver;
    use crate::error::EngineError;
    use crate::fields::FieldName;
    use crate::ocr::{ExtractionResult, Extractor, TextLine};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::fs;

    enum Behaviour {
        Text(&'static str, Option<f64>),
        Fail(EngineError),
    }

    struct MockExtractor {
        name: &'static str,
        behaviour: Behaviour,
        loaded: bool,
    }

    impl MockExtractor {
        fn text(name: &'static str, text: &'static str, confidence: Option<f64>) -> Box<Self> {
            Box::new(Self {
                name,
                behaviour: Behaviour::Text(text, confidence),
                loaded: false,
            })
        }

        fn failing(name: &'static str, error: EngineError) -> Box<Self> {
            Box::new(Self {
                name,
                behaviour: Behaviour::Fail(error),
                loaded: false,
            })
        }
    }

    #[async_trait(?Send)]
    impl Extractor for MockExtractor {
        fn name(&self) -> &str {
            self.name
        }

        fn is_loaded(&self) -> bool {
            self.loaded
        }

        async fn extract(&mut self, _document: &Path, device: Device) -> std::result::Result<ExtractionResult, EngineError> {
            self.loaded = true;
            match &self.behaviour {
                Behaviour::Text(text, confidence) => {
                    let line = match confidence {
                        Some(c) => TextLine::with_confidence(*text, *c),
                        None => TextLine::plain(*text),
                    };
                    Ok(ExtractionResult::new(self.name, vec![line], 0.05, device))
                }
                Behaviour::Fail(error) => Err(error.clone()),
            }
        }
    }

    struct Recorder {
        started: Vec<PathBuf>,
        records: usize,
        snapshots: Vec<PathBuf>,
        cancel_on_first: Option<Arc<AtomicBool>>,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                started: Vec::new(),
                records: 0,
                snapshots: Vec::new(),
                cancel_on_first: None,
            }
        }
    }

    impl RunObserver for Recorder {
        fn on_document_start(&mut self, _index: usize, _total: usize, document: &Path) {
            self.started.push(document.to_path_buf());
            if let Some(flag) = &self.cancel_on_first {
                flag.store(true, Ordering::SeqCst);
            }
        }

        fn on_record(&mut self, _record: &BenchmarkRecord) {
            self.records += 1;
        }

        fn on_snapshot(&mut self, path: &Path) {
            self.snapshots.push(path.to_path_buf());
        }
    }

    fn dataset(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            fs::write(dir.path().join(name), b"img").unwrap();
        }
        dir
    }

    fn options(engines: &[&str]) -> RunOptions {
        RunOptions {
            engines: engines.iter().map(|e| e.to_string()).collect(),
            ..RunOptions::default()
        }
    }

    #[tokio::test]
    async fn test_single_document_fields() {
        let dir = dataset(&["doc.png"]);
        let mut runner = BenchmarkRunner::with_registry(BenchConfig::default(), EngineRegistry::new());
        runner
            .registry_mut()
            .register("mock", MockExtractor::text("mock", "FECHA: 2024-01-15 EXPEDIENTE: ABC-123", None));

        let input = RunInput::Document(dir.path().join("doc.png"));
        let outcome = runner.run(&input, &options(&["mock"]), &mut NoopObserver).await.unwrap();

        assert_eq!(outcome.records.len(), 1);
        let success = outcome.records[0].outcome.success().unwrap();
        assert_eq!(success.fields.get(FieldName::Fecha), Some("2024-01-15"));
        assert_eq!(success.fields.get(FieldName::Expediente), Some("ABC-123"));
        assert_eq!(runner.phase(), RunPhase::Done);
    }

    #[tokio::test]
    async fn test_engine_failure_is_recorded() {
        let dir = dataset(&["doc.png"]);
        let mut runner = BenchmarkRunner::with_registry(BenchConfig::default(), EngineRegistry::new());
        runner.registry_mut().register(
            "broken",
            MockExtractor::failing("broken", EngineError::ExtractionFailed("CUDA error".into())),
        );

        let input = RunInput::Document(dir.path().join("doc.png"));
        let outcome = runner.run(&input, &options(&["broken"]), &mut NoopObserver).await.unwrap();

        let EngineOutcome::Failure(failure) = &outcome.records[0].outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.error, "extraction failed: CUDA error");
        assert_eq!(failure.error_kind, "extraction_failure");
        assert!(failure.processing_time >= 0.0);
    }

    #[tokio::test]
    async fn test_dataset_truncated_in_order() {
        let dir = dataset(&["c.png", "a.png", "b.png", "notes.txt"]);
        let mut runner = BenchmarkRunner::with_registry(BenchConfig::default(), EngineRegistry::new());
        runner.registry_mut().register("mock", MockExtractor::text("mock", "hola", Some(90.0)));

        let mut recorder = Recorder::new();
        let run_options = RunOptions {
            max_documents: Some(2),
            ..options(&["mock"])
        };
        let outcome = runner
            .run(&RunInput::Dataset(dir.path().to_path_buf()), &run_options, &mut recorder)
            .await
            .unwrap();

        let documents: Vec<PathBuf> = outcome.records.iter().map(|r| r.document.clone()).collect();
        assert_eq!(documents, vec![dir.path().join("a.png"), dir.path().join("b.png")]);
        assert_eq!(recorder.started, documents);
        assert_eq!(recorder.records, 2);
    }

    #[tokio::test]
    async fn test_mixed_engines_summary() {
        let dir = dataset(&["doc.png"]);
        let mut runner = BenchmarkRunner::with_registry(BenchConfig::default(), EngineRegistry::new());
        runner.registry_mut().register("a", MockExtractor::text("a", "texto", Some(85.0)));
        runner
            .registry_mut()
            .register("b", MockExtractor::failing("b", EngineError::Unavailable("no weights".into())));

        let input = RunInput::Document(dir.path().join("doc.png"));
        let outcome = runner.run(&input, &options(&["a", "b"]), &mut NoopObserver).await.unwrap();

        let a = outcome.summary.engine("a").unwrap();
        assert_eq!(a.confidence.avg, 85.0);
        assert_eq!((a.successful, a.total_tests), (1, 1));

        let b = outcome.summary.engine("b").unwrap();
        assert_eq!(b.confidence.avg, 0.0);
        assert_eq!((b.successful, b.total_tests), (0, 1));

        let reports = outcome.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].models.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_unconfigured_engines_are_attempted() {
        let dir = dataset(&["doc.png"]);
        let mut runner = BenchmarkRunner::new(BenchConfig::default());

        let input = RunInput::Document(dir.path().join("doc.png"));
        let outcome = runner
            .run(&input, &options(&["smolvlm", "tesseract"]), &mut NoopObserver)
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 2);
        for record in &outcome.records {
            let EngineOutcome::Failure(failure) = &record.outcome else {
                panic!("expected failure for {}", record.engine);
            };
            assert_eq!(failure.error_kind, "engine_unavailable");
        }
        assert_eq!(outcome.records[1].engine, "tesseract");
    }

    #[tokio::test]
    async fn test_interim_snapshots() {
        let dir = dataset(&["1.png", "2.png", "3.png", "4.png", "5.png"]);
        let mut config = BenchConfig::default();
        config.run.snapshot_every = 2;
        let mut runner = BenchmarkRunner::with_registry(config, EngineRegistry::new());
        runner.registry_mut().register("mock", MockExtractor::text("mock", "hola", None));

        let output_path = dir.path().join("out").join("run.json");
        let run_options = RunOptions {
            output: Some(output_path.clone()),
            ..options(&["mock"])
        };
        let mut recorder = Recorder::new();
        runner
            .run(&RunInput::Dataset(dir.path().to_path_buf()), &run_options, &mut recorder)
            .await
            .unwrap();

        let expected = vec![
            output::snapshot_path(&output_path, 2),
            output::snapshot_path(&output_path, 4),
        ];
        assert_eq!(recorder.snapshots, expected);

        let snapshot = output::load_reports(&expected[0]).unwrap();
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_finishes_current_document() {
        let dir = dataset(&["1.png", "2.png", "3.png"]);
        let mut runner = BenchmarkRunner::with_registry(BenchConfig::default(), EngineRegistry::new());
        runner.registry_mut().register("a", MockExtractor::text("a", "uno", None));
        runner.registry_mut().register("b", MockExtractor::text("b", "dos", None));

        let mut recorder = Recorder::new();
        recorder.cancel_on_first = Some(runner.cancel_flag());
        let outcome = runner
            .run(&RunInput::Dataset(dir.path().to_path_buf()), &options(&["a", "b"]), &mut recorder)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.documents, vec![dir.path().join("1.png")]);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.planned, 3);
    }

    #[tokio::test]
    async fn test_device_follows_batch_size() {
        let dir = dataset(&["doc.png"]);
        let mut config = BenchConfig::default();
        config.engines.device.accelerator_available = true;
        config.engines.device.min_accelerated_batch = 4;
        let mut runner = BenchmarkRunner::with_registry(config, EngineRegistry::new());
        runner.registry_mut().register("mock", MockExtractor::text("mock", "hola", None));

        let input = RunInput::Document(dir.path().join("doc.png"));
        for (batch_size, expected) in [(1, Device::Cpu), (8, Device::Accelerated)] {
            let run_options = RunOptions {
                batch_size,
                ..options(&["mock"])
            };
            let outcome = runner.run(&input, &run_options, &mut NoopObserver).await.unwrap();
            assert_eq!(outcome.records[0].outcome.success().unwrap().device, expected);
        }
    }

    #[tokio::test]
    async fn test_missing_input_is_config_error() {
        let mut runner = BenchmarkRunner::new(BenchConfig::default());
        for input in [
            RunInput::Document(PathBuf::from("/nonexistent/doc.png")),
            RunInput::Dataset(PathBuf::from("/nonexistent/dir")),
        ] {
            let err = runner
                .run(&input, &RunOptions::default(), &mut NoopObserver)
                .await
                .unwrap_err();
            assert!(matches!(err, BenchError::Config(_)));
        }
    }
}
