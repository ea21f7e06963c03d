//! Configuration structures for the benchmark pipeline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Environment variable marking an accelerator as available.
pub const ENV_ACCELERATOR: &str = "OCRBENCH_ACCELERATOR";

/// Environment variable overriding the minimum batch size for acceleration.
pub const ENV_ACCEL_MIN_BATCH: &str = "OCRBENCH_ACCEL_MIN_BATCH";

/// Main configuration for an ocrbench run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Heuristic quality scoring.
    pub scoring: ScoringConfig,

    /// Engine adapters.
    pub engines: EnginesConfig,

    /// PDF rasterization.
    pub pdf: PdfConfig,

    /// Run behaviour and persistence.
    pub run: RunConfig,
}

/// Heuristic quality scoring constants.
///
/// The weights and reference length have no empirical calibration; they are
/// kept together so the formula stays auditable as one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Text length (in characters) at which the length component saturates.
    pub reference_length: usize,

    /// Weight of the length component.
    pub length_weight: f64,

    /// Weight of the alphanumeric-density component.
    pub alnum_weight: f64,

    /// Weight of the lexical-plausibility component.
    pub lexical_weight: f64,

    /// Scores at or above this are HIGH.
    pub high_threshold: f64,

    /// Scores at or above this (and below high) are MEDIUM.
    pub medium_threshold: f64,

    /// Common function words looked up in the lowercased text.
    pub common_words: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            reference_length: 1000,
            length_weight: 30.0,
            alnum_weight: 40.0,
            lexical_weight: 30.0,
            high_threshold: 80.0,
            medium_threshold: 50.0,
            common_words: ["de", "la", "el", "en", "que", "los", "por", "con", "para", "del"]
                .iter()
                .map(|w| w.to_string())
                .collect(),
        }
    }
}

/// Engine adapter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnginesConfig {
    /// In-process PaddleOCR models.
    pub paddleocr: PaddleConfig,

    /// DocTR helper process.
    pub doctr: SubprocessEngineConfig,

    /// GOT-OCR2 helper process.
    #[serde(rename = "got-ocr2")]
    pub got_ocr2: SubprocessEngineConfig,

    /// SmolVLM helper process.
    pub smolvlm: SubprocessEngineConfig,

    /// Per-inference timeout for helper processes (None = wait forever).
    pub inference_timeout_secs: Option<u64>,

    /// Execution device selection.
    pub device: DeviceConfig,
}

/// PaddleOCR model files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddleConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,
}

impl Default for PaddleConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models/paddleocr"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
        }
    }
}

impl PaddleConfig {
    /// Full path to a model file.
    pub fn model_path(&self, file_name: &str) -> PathBuf {
        self.model_dir.join(file_name)
    }
}

/// Scale on which an engine reports confidence values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceScale {
    /// Values in [0, 1].
    #[default]
    Unit,
    /// Values in [0, 100].
    Percent,
}

impl ConfidenceScale {
    /// Normalize a raw confidence to the 0-100 scale.
    pub fn normalize(self, value: f64) -> f64 {
        let scaled = match self {
            Self::Unit => value * 100.0,
            Self::Percent => value,
        };
        scaled.clamp(0.0, 100.0)
    }
}

/// A model-server engine driven as a long-lived helper process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubprocessEngineConfig {
    /// Executable to spawn. Engines without a command are unavailable.
    pub command: Option<PathBuf>,

    /// Arguments passed to the executable.
    pub args: Vec<String>,

    /// Extra environment variables.
    pub env: BTreeMap<String, String>,

    /// Scale of the confidences the helper reports.
    pub confidence_scale: ConfidenceScale,

    /// How long to wait for the helper's ready line (model load).
    pub startup_timeout_secs: u64,
}

impl Default for SubprocessEngineConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            env: BTreeMap::new(),
            confidence_scale: ConfidenceScale::Unit,
            startup_timeout_secs: 300,
        }
    }
}

/// Accelerated execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Whether an accelerator (GPU) can be used at all.
    pub accelerator_available: bool,

    /// Smallest batch size worth moving to the accelerator.
    pub min_accelerated_batch: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            accelerator_available: false,
            min_accelerated_batch: 4,
        }
    }
}

/// PDF rasterization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// DPI for rendering PDF pages to images.
    pub render_dpi: u32,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self { render_dpi: 300 }
    }
}

/// Run behaviour and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// File extensions (lowercase, no dot) picked up from a dataset directory.
    pub extensions: Vec<String>,

    /// Write an interim snapshot every N documents (0 = never).
    pub snapshot_every: usize,

    /// Batch size used for device selection.
    pub batch_size: usize,

    /// Keep per-line text and geometry in persisted records.
    pub include_geometry: bool,

    /// Default directory for result files.
    pub results_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            extensions: ["png", "jpg", "jpeg", "tif", "tiff", "pdf"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            snapshot_every: 10,
            batch_size: 1,
            include_geometry: false,
            results_dir: PathBuf::from("results"),
        }
    }
}

impl BenchConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply `OCRBENCH_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        let accelerator = std::env::var(ENV_ACCELERATOR).ok();
        let min_batch = std::env::var(ENV_ACCEL_MIN_BATCH).ok();
        self.apply_overrides(accelerator.as_deref(), min_batch.as_deref())
    }

    /// Apply override values as they would appear in the environment.
    pub fn apply_overrides(&mut self, accelerator: Option<&str>, min_batch: Option<&str>) -> Result<()> {
        if let Some(value) = accelerator {
            self.engines.device.accelerator_available = parse_flag(value);
        }

        if let Some(value) = min_batch {
            let threshold = value.trim().parse::<usize>().map_err(|_| {
                BenchError::Config(format!("{} must be an integer, got {:?}", ENV_ACCEL_MIN_BATCH, value))
            })?;
            self.engines.device.min_accelerated_batch = threshold;
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
