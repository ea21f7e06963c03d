//! Per-engine statistics over a batch of records.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::fields::FieldName;
use crate::models::record::{BenchmarkRecord, EngineOutcome};
use crate::scoring::QualityTier;

/// Processing time statistics in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

/// Confidence statistics on the 0-100 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

/// Aggregate results for one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSummary {
    pub engine: String,
    pub total_tests: usize,
    pub successful: usize,
    pub failed: usize,
    /// successful / total_tests, 0 when nothing was attempted.
    pub success_rate: f64,
    pub timing: TimingStats,
    pub confidence: ConfidenceStats,
    /// Share of successful extractions where each field was found.
    pub field_rates: BTreeMap<FieldName, f64>,
    /// Quality tiers of successful extractions; failures count as ERROR.
    pub tiers: BTreeMap<QualityTier, usize>,
    pub review_required: usize,
}

/// Statistics for a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub generated_at: DateTime<Utc>,
    pub total_documents: usize,
    pub total_records: usize,
    pub engines: IndexMap<String, EngineSummary>,
}

impl BatchSummary {
    pub fn engine(&self, name: &str) -> Option<&EngineSummary> {
        self.engines.get(name)
    }
}

/// Summarize records, grouping by engine in first-seen order.
pub fn summarize(records: &[BenchmarkRecord]) -> BatchSummary {
    let mut by_engine: IndexMap<&str, Vec<&EngineOutcome>> = IndexMap::new();
    let mut documents = HashSet::new();

    for record in records {
        documents.insert(record.document.as_path());
        by_engine.entry(record.engine.as_str()).or_default().push(&record.outcome);
    }

    let engines = by_engine
        .into_iter()
        .map(|(engine, outcomes)| (engine.to_string(), summarize_engine(engine, &outcomes)))
        .collect();

    BatchSummary {
        generated_at: Utc::now(),
        total_documents: documents.len(),
        total_records: records.len(),
        engines,
    }
}

fn summarize_engine(engine: &str, outcomes: &[&EngineOutcome]) -> EngineSummary {
    let successes: Vec<_> = outcomes.iter().filter_map(|o| o.success()).collect();
    let total_tests = outcomes.len();
    let successful = successes.len();

    let times: Vec<f64> = successes.iter().map(|s| s.processing_time).collect();
    let confidences: Vec<f64> = successes.iter().map(|s| s.confidence).collect();

    let field_rates = FieldName::ALL
        .into_iter()
        .map(|field| {
            let found = successes.iter().filter(|s| s.fields.contains(field)).count();
            (field, ratio(found, successful))
        })
        .collect();

    let mut tiers: BTreeMap<QualityTier, usize> = QualityTier::ALL.into_iter().map(|t| (t, 0)).collect();
    for success in &successes {
        *tiers.entry(success.quality.tier).or_default() += 1;
    }
    *tiers.entry(QualityTier::Error).or_default() += total_tests - successful;

    EngineSummary {
        engine: engine.to_string(),
        total_tests,
        successful,
        failed: total_tests - successful,
        success_rate: ratio(successful, total_tests),
        timing: timing_stats(&times),
        confidence: confidence_stats(&confidences),
        field_rates,
        tiers,
        review_required: successes.iter().filter(|s| s.quality.review_required).count(),
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn min_max(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn timing_stats(times: &[f64]) -> TimingStats {
    let (min, max) = min_max(times);
    TimingStats {
        avg: mean(times),
        min,
        max,
        median: median(times),
    }
}

fn confidence_stats(confidences: &[f64]) -> ConfidenceStats {
    let (min, max) = min_max(confidences);
    ConfidenceStats {
        avg: mean(confidences),
        min,
        max,
        samples: confidences.len(),
    }
}
