//! In-process PaddleOCR engine backed by `pure-onnx-ocr`.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use image::GenericImageView;
use tracing::{debug, info, warn};

use super::{Device, ExtractionResult, Extractor, TextBox, lines_from_boxes};
use crate::document;
use crate::error::EngineError;
use crate::models::config::PaddleConfig;

enum EngineState {
    Unloaded,
    Ready(Box<pure_onnx_ocr::engine::OcrEngine>),
    /// Load failed; kept so later documents fail fast.
    Failed(String),
}

/// PaddleOCR detection + recognition models run through pure Rust ONNX.
pub struct PaddleExtractor {
    config: PaddleConfig,
    render_dpi: u32,
    state: EngineState,
}

impl PaddleExtractor {
    /// Create the adapter; models are loaded on the first extraction.
    pub fn new(config: PaddleConfig, render_dpi: u32) -> Self {
        Self {
            config,
            render_dpi,
            state: EngineState::Unloaded,
        }
    }

    fn load(config: &PaddleConfig) -> Result<pure_onnx_ocr::engine::OcrEngine, String> {
        let det_path = config.model_path(&config.detection_model);
        let rec_path = config.model_path(&config.recognition_model);
        let dict_path = config.model_path(&config.dictionary);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(format!("PaddleOCR model file not found: {}", path.display()));
            }
        }

        let start = Instant::now();
        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| format!("pure-onnx-ocr: {}", e))?;

        info!(
            "Loaded PaddleOCR models from {} in {:.2}s",
            config.model_dir.display(),
            start.elapsed().as_secs_f64()
        );
        Ok(engine)
    }

    fn engine(&mut self) -> Result<&pure_onnx_ocr::engine::OcrEngine, EngineError> {
        if matches!(self.state, EngineState::Unloaded) {
            self.state = match Self::load(&self.config) {
                Ok(engine) => EngineState::Ready(Box::new(engine)),
                Err(reason) => {
                    warn!("PaddleOCR unavailable: {}", reason);
                    EngineState::Failed(reason)
                }
            };
        }

        match &self.state {
            EngineState::Ready(engine) => Ok(engine),
            EngineState::Failed(reason) => Err(EngineError::Unavailable(reason.clone())),
            EngineState::Unloaded => Err(EngineError::Unavailable("PaddleOCR models not loaded".to_string())),
        }
    }
}

#[async_trait(?Send)]
impl Extractor for PaddleExtractor {
    fn name(&self) -> &str {
        "paddleocr"
    }

    fn is_loaded(&self) -> bool {
        matches!(self.state, EngineState::Ready(_))
    }

    async fn extract(&mut self, document: &Path, device: Device) -> Result<ExtractionResult, EngineError> {
        if device == Device::Accelerated {
            debug!("pure-onnx-ocr has no accelerated path, running on CPU");
        }

        let render_dpi = self.render_dpi;
        let engine = self.engine()?;
        let image = document::load_image(document, render_dpi)?;
        let (width, height) = image.dimensions();
        debug!("Running PaddleOCR on {} ({}x{})", document.display(), width, height);

        let start = Instant::now();
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| engine.run_from_image(&image)));
        let processing_time = start.elapsed().as_secs_f64();

        let results = match outcome {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => return Err(EngineError::ExtractionFailed(format!("pure-onnx-ocr: {}", e))),
            Err(_) => return Err(EngineError::ExtractionFailed("pure-onnx-ocr panicked during inference".to_string())),
        };

        let boxes: Vec<TextBox> = results
            .iter()
            .map(|r| TextBox {
                bbox: polygon_to_bbox(&r.bounding_box),
                text: r.text.replace("[UNK]", " "),
                recognition_score: r.confidence,
            })
            .collect();

        debug!("PaddleOCR returned {} text regions in {:.3}s", boxes.len(), processing_time);

        Ok(ExtractionResult::new(
            self.name(),
            lines_from_boxes(boxes),
            processing_time,
            Device::Cpu,
        ))
    }
}

/// Convert a `Polygon<f64>` to our `[f32; 8]` bbox format.
///
/// Extracts the first 4 exterior points (quadrilateral) as
/// `[x1, y1, x2, y2, x3, y3, x4, y4]`.
fn polygon_to_bbox(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 8] {
    let mut bbox = [0.0f32; 8];
    for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
        bbox[i * 2] = coord.x as f32;
        bbox[i * 2 + 1] = coord.y as f32;
    }
    bbox
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_models_cached_as_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = PaddleConfig {
            model_dir: dir.path().join("nowhere"),
            ..PaddleConfig::default()
        };
        let mut extractor = PaddleExtractor::new(config, 300);
        assert!(!extractor.is_loaded());

        let first = extractor.extract(Path::new("doc.png"), Device::Cpu).await.unwrap_err();
        let second = extractor.extract(Path::new("doc.png"), Device::Cpu).await.unwrap_err();

        assert_eq!(first.kind(), "engine_unavailable");
        assert_eq!(first, second);
        assert!(matches!(extractor.state, EngineState::Failed(_)));
    }
}
