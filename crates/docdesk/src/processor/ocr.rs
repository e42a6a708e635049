//! OCR through the poppler and tesseract command-line tools.
//!
//! Pages are rendered to PNG with `pdftoppm`, then read with `tesseract`.
//! Temporary files live in the system temp dir and are removed after use.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ExtractionError;

#[derive(Debug, Clone)]
pub struct OcrEngine {
    languages: String,
    dpi: u32,
}

impl OcrEngine {
    pub fn new(languages: &[String], dpi: u32) -> Self {
        let languages = if languages.is_empty() {
            "spa".to_string()
        } else {
            languages.join("+")
        };

        Self { languages, dpi }
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }

    /// OCRs up to `max_pages` pages of a PDF, one text block per page.
    pub fn ocr_pdf(&self, pdf_bytes: &[u8], page_count: usize) -> Result<String, ExtractionError> {
        let _span = tracing::info_span!("processor.ocr", pages = page_count).entered();

        let pdf = TempFile::write("pdf", pdf_bytes)?;
        let mut all_text = String::new();
        let mut failures = 0usize;

        for page in 1..=page_count as u32 {
            match self.ocr_page(pdf.path(), page) {
                Ok(text) => {
                    all_text.push_str(&text);
                    all_text.push('\n');
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!("OCR of page {} failed: {}", page, e);
                }
            }
        }

        if failures == page_count && page_count > 0 {
            return Err(ExtractionError::OcrFailed(format!(
                "none of the {} page(s) could be read",
                page_count
            )));
        }

        Ok(all_text)
    }

    fn ocr_page(&self, pdf_path: &Path, page: u32) -> Result<String, ExtractionError> {
        let image = render_page(pdf_path, page, self.dpi)?;

        let output = Command::new("tesseract")
            .arg(image.path())
            .arg("stdout")
            .args(["-l", &self.languages])
            .output()
            .map_err(|e| {
                ExtractionError::OcrFailed(format!(
                    "Failed to run tesseract: {}. Make sure tesseract-ocr is installed.",
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(ExtractionError::OcrFailed(format!(
                "tesseract failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Page count via `pdfinfo`, used when lopdf cannot parse the document.
pub fn count_pdf_pages(pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
    let pdf = TempFile::write("pdf", pdf_bytes)?;

    let output = Command::new("pdfinfo").arg(pdf.path()).output().map_err(|e| {
        ExtractionError::PdfProcessing(format!(
            "Failed to run pdfinfo: {}. Make sure poppler-utils is installed.",
            e
        ))
    })?;

    if !output.status.success() {
        return Err(ExtractionError::PdfProcessing(format!(
            "pdfinfo failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(parse_page_count(&String::from_utf8_lossy(&output.stdout)).unwrap_or(1))
}

fn parse_page_count(pdfinfo_output: &str) -> Option<usize> {
    pdfinfo_output
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|count| count.trim().parse().ok())
}

fn render_page(pdf_path: &Path, page: u32, dpi: u32) -> Result<TempFile, ExtractionError> {
    let prefix = std::env::temp_dir().join(format!("docdesk_page_{}", uuid::Uuid::new_v4()));
    let page_arg = page.to_string();

    let output = Command::new("pdftoppm")
        .args(["-png", "-r", &dpi.to_string(), "-f", &page_arg, "-l", &page_arg])
        .arg(pdf_path)
        .arg(&prefix)
        .output()
        .map_err(|e| {
            ExtractionError::PdfProcessing(format!(
                "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                e
            ))
        })?;

    if !output.status.success() {
        return Err(ExtractionError::PdfProcessing(format!(
            "pdftoppm failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    // pdftoppm zero-pads the page suffix depending on the document's page count.
    let prefix = prefix.display().to_string();
    [
        format!("{}-{}.png", prefix, page),
        format!("{}-{:02}.png", prefix, page),
        format!("{}-{:03}.png", prefix, page),
    ]
    .into_iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
    .map(|path| TempFile { path })
    .ok_or_else(|| {
        ExtractionError::PdfProcessing("Failed to find rendered page image".to_string())
    })
}

/// A file in the temp dir, removed on drop.
struct TempFile {
    path: PathBuf,
}

impl TempFile {
    fn write(extension: &str, bytes: &[u8]) -> Result<Self, ExtractionError> {
        let path = std::env::temp_dir().join(format!(
            "docdesk_{}.{}",
            uuid::Uuid::new_v4(),
            extension
        ));
        std::fs::write(&path, bytes).map_err(|e| {
            ExtractionError::PdfProcessing(format!("Failed to write temp file: {}", e))
        })?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_languages_joined_with_plus() {
        let engine = OcrEngine::new(&["spa".to_string(), "eng".to_string()], 200);
        assert_eq!(engine.languages(), "spa+eng");
        assert_eq!(engine.dpi(), 200);
    }

    #[test]
    fn test_default_language_is_spanish() {
        assert_eq!(OcrEngine::new(&[], 300).languages(), "spa");
    }

    #[test]
    fn test_parse_page_count() {
        let output = "Producer:       Banco\nPages:          12\nEncrypted:      no\n";
        assert_eq!(parse_page_count(output), Some(12));
        assert_eq!(parse_page_count("garbage"), None);
    }

    #[test]
    fn test_temp_file_removed_on_drop() {
        let file = TempFile::write("bin", b"abc").unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());
        drop(file);
        assert!(!path.exists());
    }
}
