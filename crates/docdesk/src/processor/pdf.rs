use crate::error::ExtractionError;
use crate::processor::ocr::{count_pdf_pages, OcrEngine};

/// Text pulled out of a PDF, page texts joined by newlines.
#[derive(Debug, Clone)]
pub struct PdfText {
    pub text: String,
    pub pages: usize,
    pub used_ocr: bool,
}

impl PdfText {
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }
}

pub struct PdfTextExtractor {
    ocr: Option<OcrEngine>,
    max_pages: usize,
}

impl PdfTextExtractor {
    pub fn new(ocr: Option<OcrEngine>, max_pages: usize) -> Self {
        Self {
            ocr,
            max_pages: max_pages.max(1),
        }
    }

    pub fn without_ocr() -> Self {
        Self::new(None, usize::MAX)
    }

    pub fn ocr_enabled(&self) -> bool {
        self.ocr.is_some()
    }

    /// Embedded text first; OCR when the document cannot be parsed or its
    /// text layer is empty or garbled.
    pub fn extract(&self, pdf_bytes: &[u8]) -> Result<PdfText, ExtractionError> {
        let _span = tracing::info_span!("processor.pdf", bytes = pdf_bytes.len()).entered();

        match lopdf::Document::load_mem(pdf_bytes) {
            Ok(doc) => {
                let pages = doc.get_pages().len();
                let text = extract_text_from_pdf(&doc);

                if !should_use_ocr(&text) {
                    return Ok(PdfText {
                        text,
                        pages,
                        used_ocr: false,
                    });
                }

                match &self.ocr {
                    Some(ocr) => {
                        let _ocr_span =
                            tracing::info_span!("processor.ocr_fallback", reason = "text_quality")
                                .entered();
                        let text = ocr.ocr_pdf(pdf_bytes, pages.min(self.max_pages))?;
                        Ok(PdfText {
                            text,
                            pages,
                            used_ocr: true,
                        })
                    }
                    None => Ok(PdfText {
                        text,
                        pages,
                        used_ocr: false,
                    }),
                }
            }
            Err(e) => {
                tracing::warn!("lopdf failed to parse document: {}", e);
                let Some(ocr) = &self.ocr else {
                    return Err(ExtractionError::PdfProcessing(format!(
                        "Failed to load PDF: {}. OCR fallback unavailable.",
                        e
                    )));
                };

                let _ocr_span =
                    tracing::info_span!("processor.ocr_fallback", reason = "lopdf_parse_failed")
                        .entered();
                let pages = count_pdf_pages(pdf_bytes)?;
                let text = ocr.ocr_pdf(pdf_bytes, pages.min(self.max_pages))?;
                Ok(PdfText {
                    text,
                    pages,
                    used_ocr: true,
                })
            }
        }
    }
}

fn extract_text_from_pdf(doc: &lopdf::Document) -> String {
    let mut text = String::new();

    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => tracing::debug!("No text on page {}: {}", page_num, e),
        }
    }

    text
}

/// Marker lopdf emits for CID fonts it cannot decode.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Below this many characters the alphanumeric ratio check is skipped.
const MIN_TOTAL_CHARS: usize = 50;

/// Text with fewer alphanumeric characters than this percentage counts as garbled.
const MIN_ALPHANUMERIC_PERCENT: usize = 10;

/// True when the text layer is empty, only encoding-error markers, or mostly
/// non-alphanumeric noise.
fn should_use_ocr(text: &str) -> bool {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return true;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");

    if cleaned.is_empty() {
        return true;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();

    total_chars > MIN_TOTAL_CHARS
        && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::pdf_with_lines;

    #[test]
    fn test_extracts_embedded_text() {
        let bytes = pdf_with_lines(&["Test PDF Content", "Second line"]);

        let result = PdfTextExtractor::without_ocr().extract(&bytes).unwrap();

        assert_eq!(result.pages, 1);
        assert!(!result.used_ocr);
        assert!(result.text.contains("Test PDF Content"));
        assert!(result.text.contains("Second line"));
    }

    #[test]
    fn test_corrupted_pdf_without_ocr_errors() {
        let result = PdfTextExtractor::without_ocr().extract(b"not a valid pdf content");

        match result {
            Err(ExtractionError::PdfProcessing(msg)) => {
                assert!(msg.contains("Failed to load PDF"), "got: {}", msg);
            }
            other => panic!("Expected PdfProcessing error, got {:?}", other),
        }
    }

    #[test]
    fn test_should_use_ocr_empty_text() {
        assert!(should_use_ocr(""));
        assert!(should_use_ocr("   \n\t  "));
    }

    #[test]
    fn test_should_use_ocr_identity_h_only() {
        assert!(should_use_ocr(
            "?Identity-H Unimplemented??Identity-H Unimplemented?\n"
        ));
    }

    #[test]
    fn test_should_use_ocr_garbled_text() {
        assert!(should_use_ocr(&"�.-,;:!¡¿?()[]{}".repeat(10)));
    }

    #[test]
    fn test_should_not_use_ocr_for_statement_text() {
        assert!(!should_use_ocr(
            "01/07/2024 TRANSFERENCIA RECIBIDA 15.000,00 115.000,00"
        ));
    }

    #[test]
    fn test_should_not_use_ocr_short_symbols() {
        assert!(!should_use_ocr("$ - ,"));
    }
}
