//! Fixtures shared by the server tests.

#![allow(dead_code)]

use std::sync::Arc;

use lopdf::{dictionary, Document, Object, Stream};
use tempfile::TempDir;

use docdesk::{Config, Service};
use docdesk_server::{router, AppState};

pub const BOUNDARY: &str = "docdesk-test-boundary";

/// Router plus the directory backing its output.
pub struct TestApp {
    pub temp_dir: TempDir,
    pub service: Arc<Service>,
    pub router: axum::Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut config = Config::default();
        config.output_directory = temp_dir.path().to_string_lossy().into_owned();
        config.worker_count = 1;
        config.ocr.enabled = false;
        configure(&mut config);

        let service = Arc::new(Service::start(Arc::new(config)).expect("Failed to start service"));
        let router = router(AppState::new(Arc::clone(&service)));

        Self {
            temp_dir,
            service,
            router,
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.service.shutdown();
    }
}

/// Hand-built `multipart/form-data` body with one part per `(field, filename, bytes)`.
pub fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, bytes) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

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

pub fn statement_pdf() -> Vec<u8> {
    pdf_with_lines(&[
        "BANCO DE LA NACION ARGENTINA",
        "01/07/2024 TRANSFERENCIA RECIBIDA 1.000,00 2.000,00",
        "02/07/2024 COMISION MANTENIMIENTO 100,00 1.900,00",
    ])
}

pub fn corrupt_pdf() -> Vec<u8> {
    b"%PDF-1.4\nthis is not really a pdf".to_vec()
}
