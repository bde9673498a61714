//! Plain-text extraction from uploaded course documents.

use std::path::Path;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::util::collapse_whitespace;

/// "Extract plain text from a file path, may fail."
#[async_trait]
pub trait TextExtractor: Send + Sync {
  async fn extract(&self, path: &str) -> Result<String, String>;
}

/// PDF extraction via `pdf-extract`, run on the blocking pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
  #[instrument(level = "info", skip(self))]
  async fn extract(&self, path: &str) -> Result<String, String> {
    if !Path::new(path).is_file() {
      return Err(format!("File not found: {path}"));
    }
    let owned = path.to_string();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
      .await
      .map_err(|e| format!("Extraction task failed: {e}"))?
      .map_err(|e| {
        warn!(error = %e, "PDF extraction failed");
        format!("Could not read PDF: {e}")
      })?;
    let clean = collapse_whitespace(&text);
    info!(chars = clean.chars().count(), "PDF text extracted");
    Ok(clean)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn missing_file_is_reported() {
    let err = PdfTextExtractor.extract("/definitely/not/here.pdf").await.unwrap_err();
    assert!(err.contains("not found"));
  }

  #[tokio::test]
  async fn garbage_pdf_fails_gracefully() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.pdf");
    std::fs::write(&path, b"this is not a pdf").unwrap();
    assert!(PdfTextExtractor.extract(path.to_str().unwrap()).await.is_err());
  }
}
