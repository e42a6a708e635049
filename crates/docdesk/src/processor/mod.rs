pub mod ocr;
pub mod pdf;

pub use ocr::OcrEngine;
pub use pdf::{PdfText, PdfTextExtractor};

use crate::config::OcrConfig;

/// Builds the PDF text extractor described by the OCR section of the config.
pub fn pdf_extractor(config: &OcrConfig) -> PdfTextExtractor {
    let ocr = config
        .enabled
        .then(|| OcrEngine::new(&config.languages, config.dpi));
    PdfTextExtractor::new(ocr, config.max_pages)
}
