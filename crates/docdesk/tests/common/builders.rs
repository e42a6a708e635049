//! Builders for test inputs: PDFs with known text, workbooks and configs.

#![allow(dead_code)]

use lopdf::{dictionary, Document, Object, Stream};

use docdesk::config::Config;
use docdesk::sheet::{workbook_bytes, Cell, Sheet};

/// Single-page PDF with one text line per entry. ASCII only.
pub fn pdf_with_lines(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let content: String = lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("BT /F1 9 Tf 30 {} Td ({}) Tj ET\n", 780 - 12 * i as i64, line))
        .collect();
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to serialize PDF");
    bytes
}

/// A statement the bank extractor turns into two movements.
pub fn statement_pdf(bank: &str) -> Vec<u8> {
    pdf_with_lines(&[
        bank,
        "01/07/2024 TRANSFERENCIA RECIBIDA 1.000,00 2.000,00",
        "02/07/2024 COMISION MANTENIMIENTO 100,00 1.900,00",
    ])
}

/// Truncated header followed by noise; no PDF parser accepts it.
pub fn corrupt_pdf() -> Vec<u8> {
    b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\nthis is not really a pdf".to_vec()
}

/// F.572 form with one dependent and one deduction.
pub fn tax_form_pdf(cuil: &str, name: &str) -> Vec<u8> {
    let cuil_line = format!("CUIL: {}", cuil);
    let name_line = format!("Apellido y Nombre: {}", name);
    pdf_with_lines(&[
        "F.572 Web - SIRADIG",
        &cuil_line,
        &name_line,
        "1 - Detalles de las cargas de familia",
        "PEREZ JUAN CUIL: 20-33444555-6 02/02/1985 Conyuge",
        "3 - Deducciones y desgravaciones",
        "Cuotas Medico Asistenciales $ 120.000,00",
        "Enero - Junio 6 x $ 10.000,00 $ 60.000,00",
    ])
}

/// Workbook whose first row is the header.
pub fn workbook(header: &[&str], rows: &[Vec<Cell>]) -> Vec<u8> {
    let mut sheet = Sheet::new("Hoja1", header.to_vec());
    for row in rows {
        sheet.push_row(row.clone());
    }
    workbook_bytes(&[sheet]).expect("Failed to build workbook")
}

/// Builder for `Config` instances pointed at a test directory.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// One worker, OCR off.
    pub fn new(output_directory: &std::path::Path) -> Self {
        let mut config = Config::default();
        config.output_directory = output_directory.to_string_lossy().into_owned();
        config.worker_count = 1;
        config.ocr.enabled = false;
        Self { config }
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    pub fn max_files(mut self, max: usize) -> Self {
        self.config.tools.bank_statements.max_files = max;
        self.config.tools.tax_form.max_files = max;
        self.config.tools.consolidator.max_files = max;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.tools.bank_statements.max_file_size_bytes = bytes;
        self.config.tools.tax_form.max_file_size_bytes = bytes;
        self.config.tools.consolidator.max_file_size_bytes = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
