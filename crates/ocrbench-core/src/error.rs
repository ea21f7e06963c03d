//! Error types for the ocrbench-core library.

use std::time::Duration;

use thiserror::Error;

/// Main error type for the ocrbench library.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Engine-level failure (load, decode, inference).
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// PDF rasterization error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV rendering error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid field pattern.
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Failures of a single engine on a single document.
///
/// None of these abort a benchmark run; the runner turns them into failure
/// records and moves on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The engine's runtime or model could not be loaded.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The input could not be decoded as an image or PDF.
    #[error("document unreadable: {0}")]
    DocumentUnreadable(String),

    /// The engine loaded but inference failed.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// Inference exceeded the configured timeout.
    #[error("inference timed out after {0:?}")]
    Timeout(Duration),
}

impl EngineError {
    /// Stable tag written into failure records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "engine_unavailable",
            Self::DocumentUnreadable(_) => "document_unreadable",
            Self::ExtractionFailed(_) => "extraction_failure",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// Errors related to PDF rasterization.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// No raster content could be recovered from the page.
    #[error("failed to extract page image: {0}")]
    ImageExtraction(String),
}

impl From<PdfError> for EngineError {
    fn from(err: PdfError) -> Self {
        EngineError::DocumentUnreadable(err.to_string())
    }
}

impl From<image::ImageError> for EngineError {
    fn from(err: image::ImageError) -> Self {
        EngineError::DocumentUnreadable(err.to_string())
    }
}

/// Result type for the ocrbench library.
pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_kinds() {
        assert_eq!(EngineError::Unavailable("x".into()).kind(), "engine_unavailable");
        assert_eq!(EngineError::DocumentUnreadable("x".into()).kind(), "document_unreadable");
        assert_eq!(EngineError::ExtractionFailed("x".into()).kind(), "extraction_failure");
        assert_eq!(EngineError::Timeout(Duration::from_secs(1)).kind(), "timeout");
    }

    #[test]
    fn test_pdf_error_is_unreadable_document() {
        let err: EngineError = PdfError::NoPages.into();
        assert_eq!(err, EngineError::DocumentUnreadable("PDF has no pages".to_string()));
    }
}
