pub mod bank;
pub mod bank_statement;
pub mod consolidator;
pub mod layout;
pub mod tax_form;
pub mod text;

use std::sync::Arc;

use crate::config::OcrConfig;
use crate::error::ExtractionError;
use crate::processor::{pdf_extractor, PdfTextExtractor};
use crate::sheet::Sheet;
use crate::tool::Tool;
use crate::validate::SourceFile;

pub use bank_statement::BankStatementExtractor;
pub use consolidator::SpreadsheetConsolidator;
pub use tax_form::TaxFormExtractor;

/// What one input file produced: a table plus a short note for the job log.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub records: usize,
    pub detail: Option<String>,
    pub sheet: Sheet,
}

impl Extraction {
    pub fn new(sheet: Sheet, detail: Option<String>) -> Self {
        Self {
            records: sheet.len(),
            detail,
            sheet,
        }
    }
}

pub trait Extractor: Send + Sync {
    fn tool(&self) -> Tool;

    fn extract(&self, file: &SourceFile) -> Result<Extraction, ExtractionError>;

    /// Merges the successful extractions of a batch into one sheet.
    /// `None` when there is nothing to merge.
    fn consolidate(&self, extractions: &[&Extraction]) -> Option<Sheet>;
}

pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new(ocr: &OcrConfig) -> Self {
        Self::with_pdf(Arc::new(pdf_extractor(ocr)))
    }

    pub fn with_pdf(pdf: Arc<PdfTextExtractor>) -> Self {
        let extractors: Vec<Box<dyn Extractor>> = vec![
            Box::new(BankStatementExtractor::new(Arc::clone(&pdf))),
            Box::new(TaxFormExtractor::new(pdf)),
            Box::new(SpreadsheetConsolidator::new()),
        ];

        Self { extractors }
    }

    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Adds an extractor, replacing any already registered for the same tool.
    pub fn register(&mut self, extractor: Box<dyn Extractor>) {
        let tool = extractor.tool();
        self.extractors.retain(|e| e.tool() != tool);
        self.extractors.push(extractor);
    }

    pub fn for_tool(&self, tool: Tool) -> Option<&dyn Extractor> {
        self.extractors
            .iter()
            .find(|e| e.tool() == tool)
            .map(|e| e.as_ref())
    }
}
