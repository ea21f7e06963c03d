//! OCR engine adapters and the normalized extraction shape they produce.

mod device;
#[cfg(feature = "native")]
mod paddle;
mod registry;
mod subprocess;
mod unavailable;

pub use device::{Device, select_device};
#[cfg(feature = "native")]
pub use paddle::PaddleExtractor;
pub use registry::EngineRegistry;
pub(crate) use registry::canonical_name;
pub use subprocess::SubprocessExtractor;
pub use unavailable::UnavailableExtractor;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Shared contract for every OCR engine wrapper.
///
/// Adapters report failures through `EngineError`; the runner records them
/// and continues with the next engine or document.
#[async_trait(?Send)]
pub trait Extractor {
    /// Engine name used in records and reports.
    fn name(&self) -> &str;

    /// Whether the engine's model or process is already loaded.
    fn is_loaded(&self) -> bool;

    /// Run OCR over one document.
    ///
    /// The first call may load the model; the reported processing time only
    /// covers inference.
    async fn extract(&mut self, document: &Path, device: Device) -> Result<ExtractionResult, EngineError>;
}

/// The fixed set of benchmarked engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Doctr,
    PaddleOcr,
    GotOcr2,
    SmolVlm,
}

impl EngineKind {
    /// All engines in default benchmark order.
    pub const ALL: [EngineKind; 4] = [Self::Doctr, Self::PaddleOcr, Self::GotOcr2, Self::SmolVlm];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Doctr => "doctr",
            Self::PaddleOcr => "paddleocr",
            Self::GotOcr2 => "got-ocr2",
            Self::SmolVlm => "smolvlm",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown engine '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// A detected text box with its coordinates and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBox {
    /// Bounding box coordinates (x1, y1, x2, y2, x3, y3, x4, y4) for quadrilateral.
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,

    /// Recognition confidence score (0.0 - 1.0).
    pub recognition_score: f32,
}

impl TextBox {
    /// Get the axis-aligned bounding rectangle.
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }
}

/// Sort boxes by reading order (top-to-bottom, left-to-right).
pub fn sort_by_reading_order(boxes: &mut [TextBox]) {
    boxes.sort_by(|a, b| {
        let (ax, ay, _, _) = a.rect();
        let (bx, by, _, _) = b.rect();

        // Group by approximate vertical position (within 20 pixels)
        let row_a = (ay / 20.0) as i32;
        let row_b = (by / 20.0) as i32;

        if row_a != row_b {
            row_a.cmp(&row_b)
        } else {
            ax.partial_cmp(&bx).unwrap_or(std::cmp::Ordering::Equal)
        }
    });
}

/// Convert recognized boxes into normalized lines.
///
/// Boxes are put in reading order; recognizer scores become 0-100 line
/// confidences and the quadrilateral is reduced to its bounding rectangle.
pub fn lines_from_boxes(mut boxes: Vec<TextBox>) -> Vec<TextLine> {
    sort_by_reading_order(&mut boxes);
    boxes
        .into_iter()
        .map(|b| {
            let (x1, y1, x2, y2) = b.rect();
            TextLine {
                text: b.text,
                confidence: Some((b.recognition_score as f64 * 100.0).clamp(0.0, 100.0)),
                bbox: Some([x1, y1, x2, y2]),
                words: Vec::new(),
            }
        })
        .collect()
}

/// One recognized word with optional geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordBox {
    pub text: String,

    /// Confidence on the 0-100 scale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Axis-aligned box (x1, y1, x2, y2).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f32; 4]>,
}

/// One line of extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,

    /// Confidence on the 0-100 scale, if the engine exposes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Axis-aligned box (x1, y1, x2, y2).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f32; 4]>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<WordBox>,
}

impl TextLine {
    /// A line with text only.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
            bbox: None,
            words: Vec::new(),
        }
    }

    /// A line with a 0-100 confidence.
    pub fn with_confidence(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            confidence: Some(confidence),
            ..Self::plain(text)
        }
    }
}

/// Normalized output of one engine on one document.
///
/// Built once by an adapter and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    engine: String,
    lines: Vec<TextLine>,
    processing_time: f64,
    device: Device,
}

impl ExtractionResult {
    /// Build a result, trimming line text and dropping empty lines.
    pub fn new(engine: impl Into<String>, lines: Vec<TextLine>, processing_time: f64, device: Device) -> Self {
        let lines = lines
            .into_iter()
            .filter_map(|mut line| {
                let trimmed = line.text.trim();
                if trimmed.is_empty() {
                    return None;
                }
                if trimmed.len() != line.text.len() {
                    line.text = trimmed.to_string();
                }
                Some(line)
            })
            .collect();

        Self {
            engine: engine.into(),
            lines,
            processing_time: processing_time.max(0.0),
            device,
        }
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn lines(&self) -> &[TextLine] {
        &self.lines
    }

    /// Inference wall-clock time in seconds.
    pub fn processing_time(&self) -> f64 {
        self.processing_time
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Lines joined with newlines.
    pub fn raw_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn lines_count(&self) -> usize {
        self.lines.len()
    }

    pub fn words_count(&self) -> usize {
        self.lines.iter().map(|l| l.text.split_whitespace().count()).sum()
    }

    pub fn characters_count(&self) -> usize {
        self.raw_text().chars().count()
    }

    /// Per-line confidences for lines that carry one.
    pub fn line_confidences(&self) -> Vec<f64> {
        self.lines.iter().filter_map(|l| l.confidence).collect()
    }

    /// Mean native confidence, or None when the engine exposes none.
    pub fn mean_confidence(&self) -> Option<f64> {
        let confidences = self.line_confidences();
        if confidences.is_empty() {
            return None;
        }
        Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_box(x: f32, y: f32, text: &str, score: f32) -> TextBox {
        TextBox {
            bbox: [x, y, x + 50.0, y, x + 50.0, y + 10.0, x, y + 10.0],
            text: text.to_string(),
            recognition_score: score,
        }
    }

    #[test]
    fn test_engine_kind_parse() {
        assert_eq!("doctr".parse::<EngineKind>().unwrap(), EngineKind::Doctr);
        assert_eq!("PaddleOCR".parse::<EngineKind>().unwrap(), EngineKind::PaddleOcr);
        assert_eq!("got_ocr2".parse::<EngineKind>().unwrap(), EngineKind::GotOcr2);
        assert!("tesseract".parse::<EngineKind>().is_err());
        assert_eq!(EngineKind::SmolVlm.to_string(), "smolvlm");
    }

    #[test]
    fn test_lines_from_boxes_reading_order() {
        let boxes = vec![
            text_box(200.0, 5.0, "right", 0.5),
            text_box(0.0, 100.0, "below", 0.9),
            text_box(10.0, 2.0, "left", 0.75),
        ];

        let lines = lines_from_boxes(boxes);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["left", "right", "below"]);
        assert_eq!(lines[0].confidence, Some(75.0));
        assert_eq!(lines[0].bbox, Some([10.0, 2.0, 60.0, 12.0]));
    }

    #[test]
    fn test_extraction_result_trims_and_counts() {
        let result = ExtractionResult::new(
            "test",
            vec![
                TextLine::with_confidence("  FECHA: 2024-01-15 ", 90.0),
                TextLine::plain("   "),
                TextLine::with_confidence("EXPEDIENTE ABC", 80.0),
            ],
            0.25,
            Device::Cpu,
        );

        assert_eq!(result.raw_text(), "FECHA: 2024-01-15\nEXPEDIENTE ABC");
        assert_eq!(result.lines_count(), 2);
        assert_eq!(result.words_count(), 4);
        assert_eq!(result.characters_count(), 32);
        assert_eq!(result.mean_confidence(), Some(85.0));
    }

    #[test]
    fn test_mean_confidence_absent_without_native_scores() {
        let result = ExtractionResult::new("test", vec![TextLine::plain("hola")], -1.0, Device::Cpu);
        assert_eq!(result.mean_confidence(), None);
        assert_eq!(result.processing_time(), 0.0);
    }
}
