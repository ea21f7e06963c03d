//! Document loading and dataset discovery.

mod pdf;

pub use pdf::PdfRasterizer;

use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::{debug, warn};

use crate::error::{BenchError, EngineError, Result};

/// Kind of input document, decided from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Image,
    Pdf,
}

impl DocumentKind {
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"%PDF-") {
            Self::Pdf
        } else {
            Self::Image
        }
    }
}

/// Read a document from disk and decode it to an image.
pub fn load_image(path: &Path, render_dpi: u32) -> std::result::Result<DynamicImage, EngineError> {
    let bytes = std::fs::read(path)
        .map_err(|e| EngineError::DocumentUnreadable(format!("{}: {}", path.display(), e)))?;
    decode_document(&bytes, render_dpi)
}

/// Decode image bytes, rasterizing the first page when the bytes are a PDF.
///
/// A panic inside the PDF or image decoders is reported as an unreadable
/// document so one corrupt file cannot end a run.
pub fn decode_document(bytes: &[u8], render_dpi: u32) -> std::result::Result<DynamicImage, EngineError> {
    std::panic::catch_unwind(|| decode(bytes, render_dpi)).unwrap_or_else(|_| {
        warn!("Decoder panicked on a {:?} document", DocumentKind::sniff(bytes));
        Err(EngineError::DocumentUnreadable("decoder panicked on malformed document".to_string()))
    })
}

fn decode(bytes: &[u8], render_dpi: u32) -> std::result::Result<DynamicImage, EngineError> {
    match DocumentKind::sniff(bytes) {
        DocumentKind::Pdf => {
            let rasterizer = PdfRasterizer::load(bytes)?;
            if rasterizer.page_count() > 1 {
                debug!("PDF has {} pages, only the first is rasterized", rasterizer.page_count());
            }
            Ok(rasterizer.render_page(1, render_dpi)?)
        }
        DocumentKind::Image => Ok(image::load_from_memory(bytes)?),
    }
}

/// List documents in a directory, in sorted path order.
///
/// Only files whose lowercase extension is in `extensions` are returned;
/// the list is cut to `max_documents` when given.
pub fn discover_documents(dir: &Path, extensions: &[String], max_documents: Option<usize>) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(BenchError::Config(format!("not a directory: {}", dir.display())));
    }

    let pattern = format!("{}/*", glob::Pattern::escape(&dir.to_string_lossy()));
    let entries = glob::glob(&pattern).map_err(|e| BenchError::Config(format!("invalid dataset path: {}", e)))?;

    let mut documents: Vec<PathBuf> = entries
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
            extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(&ext))
        })
        .collect();

    if let Some(max) = max_documents {
        documents.truncate(max);
    }

    debug!("Discovered {} documents in {}", documents.len(), dir.display());
    Ok(documents)
}
