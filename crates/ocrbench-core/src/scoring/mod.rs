//! Heuristic quality scoring and tiering.
//!
//! Several engines expose no native confidence, so extractions are scored
//! with a three-part weighted sum instead:
//!
//! - length: characters relative to a reference length, capped at 1
//! - alphanumeric density: alphanumeric characters over all characters
//! - lexical plausibility: fraction of common function words present
//!
//! The weights and reference length live in [`ScoringConfig`]. They are an
//! approximation kept for comparability across engines, not a calibrated
//! accuracy estimate.

use serde::{Deserialize, Serialize};

use crate::models::config::ScoringConfig;
use crate::ocr::ExtractionResult;

/// Quality classification of one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityTier {
    High,
    Medium,
    Low,
    Error,
}

impl QualityTier {
    pub const ALL: [QualityTier; 4] = [Self::High, Self::Medium, Self::Low, Self::Error];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Error => "ERROR",
        }
    }

    /// Everything below HIGH needs a human look.
    pub fn review_required(self) -> bool {
        self != Self::High
    }
}

/// Where a score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceSource {
    /// Mean of the engine's own line confidences.
    Native,
    /// The weighted text heuristic.
    Heuristic,
}

/// Score (0-100), tier and review flag for one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub score: f64,
    pub tier: QualityTier,
    pub review_required: bool,
    pub source: ConfidenceSource,
}

impl QualityScore {
    /// The score given to empty text and failed extractions.
    pub fn error() -> Self {
        Self {
            score: 0.0,
            tier: QualityTier::Error,
            review_required: true,
            source: ConfidenceSource::Heuristic,
        }
    }
}

/// Scores extractions against a fixed set of constants.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    config: ScoringConfig,
}

impl QualityScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Heuristic score of raw text.
    pub fn score(&self, raw_text: &str) -> QualityScore {
        if raw_text.trim().is_empty() {
            return QualityScore::error();
        }
        self.classify(self.heuristic(raw_text), ConfidenceSource::Heuristic)
    }

    /// Quality of an extraction: native confidence when the engine gave
    /// one, the heuristic otherwise.
    pub fn assess(&self, result: &ExtractionResult) -> QualityScore {
        let raw_text = result.raw_text();
        if raw_text.trim().is_empty() {
            return QualityScore::error();
        }

        match result.mean_confidence() {
            Some(confidence) => self.classify(confidence.clamp(0.0, 100.0), ConfidenceSource::Native),
            None => self.classify(self.heuristic(&raw_text), ConfidenceSource::Heuristic),
        }
    }

    /// Tier for a 0-100 score.
    pub fn tier(&self, score: f64) -> QualityTier {
        if score >= self.config.high_threshold {
            QualityTier::High
        } else if score >= self.config.medium_threshold {
            QualityTier::Medium
        } else {
            QualityTier::Low
        }
    }

    /// The weighted sum itself, clamped to [0, 100]. Empty text scores 0.
    pub fn heuristic(&self, raw_text: &str) -> f64 {
        let total = raw_text.chars().count();
        if total == 0 {
            return 0.0;
        }
        let cfg = &self.config;

        let length = if cfg.reference_length == 0 {
            1.0
        } else {
            (total as f64 / cfg.reference_length as f64).min(1.0)
        };

        let alnum = raw_text.chars().filter(|c| c.is_alphanumeric()).count() as f64 / total as f64;

        let lexical = if cfg.common_words.is_empty() {
            0.0
        } else {
            let lowered = raw_text.to_lowercase();
            let found = cfg
                .common_words
                .iter()
                .filter(|w| lowered.contains(&w.to_lowercase()))
                .count();
            found as f64 / cfg.common_words.len() as f64
        };

        let score = length * cfg.length_weight + alnum * cfg.alnum_weight + lexical * cfg.lexical_weight;
        score.clamp(0.0, 100.0)
    }

    fn classify(&self, score: f64, source: ConfidenceSource) -> QualityScore {
        let tier = self.tier(score);
        QualityScore {
            score,
            tier,
            review_required: tier.review_required(),
            source,
        }
    }
}
