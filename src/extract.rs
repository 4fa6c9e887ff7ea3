//! Text extraction from uploaded policy documents
//!
//! PDF goes through pdf-extract; txt and md are read as plain text. The
//! chunker normalizes whitespace downstream, so markdown markup is left
//! in place rather than stripped.

use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// A document shorter than this after extraction carries no usable policy
/// text and fails ingestion up front.
pub const MIN_VIABLE_LENGTH: usize = 50;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("No extractable text in document: {0}")]
    Empty(String),
    #[error("Unsupported document type: {0}")]
    UnsupportedType(String),
    #[error("Failed to read document: {0}")]
    Read(#[from] std::io::Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Extract plain text from a document file, dispatching on extension
pub fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let text = match ext.as_str() {
        "txt" | "md" => std::fs::read_to_string(path)?,
        "pdf" => extract_pdf(path)?,
        other => return Err(ExtractError::UnsupportedType(other.to_string())),
    };

    debug!(document = %name, chars = text.len(), "extracted document text");

    if text.trim().len() < MIN_VIABLE_LENGTH {
        return Err(ExtractError::Empty(name));
    }

    Ok(text)
}

fn extract_pdf(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path)?;
    pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}
