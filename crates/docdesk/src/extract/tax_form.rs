//! F.572 (SIRADIG) employee declarations: one row per dependent, deduction
//! or declared amount, grouped by the form's five numbered sections.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::error::ExtractionError;
use crate::extract::text::{normalize_line, parse_amount};
use crate::extract::{Extraction, Extractor};
use crate::processor::PdfTextExtractor;
use crate::sheet::{Cell, Sheet};
use crate::tool::Tool;
use crate::validate::SourceFile;

pub const COLUMNS: [&str; 10] = [
    "LEGAJO",
    "CUIL",
    "Nombre y Apellido",
    "Seccion",
    "Concepto",
    "Periodo",
    "Cantidad",
    "Monto unitario",
    "Monto total",
    "Archivo",
];

const SHEET_NAME: &str = "SIRADIG";

const SECTION_NAMES: [&str; 5] = [
    "Detalles de las cargas de familia",
    "Importe de las ganancias liquidadas en el transcurso del período fiscal por otros empleadores o entidades",
    "Deducciones y desgravaciones",
    "Otras Retenciones, Percepciones y Pagos a Cuenta",
    "Beneficios",
];

const NOT_AVAILABLE: &str = "NA";
const FULL_YEAR: &str = "Enero - Diciembre";

const MONTHS: &str =
    "Enero|Febrero|Marzo|Abril|Mayo|Junio|Julio|Agosto|Septiembre|Octubre|Noviembre|Diciembre";

static RE_CUIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:CUIL|CUIT)[:\s]+(\d{2}-?\d{8}-?\d)").unwrap());

static RE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)Apellido y Nombre[:\s]+(.+?)(?:\s+Domicilio.*)?$").unwrap()
});

static RE_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([1-5])\s*[-–—]\s*(.*)$").unwrap());

static RE_NOTHING_DECLARED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(No se informa(?:n|ron)?|Ninguno)\.?").unwrap());

static RE_DEPENDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CUIL:?\s*(\d{2}-?\d{8}-?\d)").unwrap());

static RE_BIRTH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{2}/\d{2}/\d{4})\b").unwrap());

static RE_RELATIONSHIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(Uni[oó]n convivencial|Hijo/a menor de 18 a[ñn]os|Hijastro/a|Hijastro|Hijo/a incapacitado/a para el trabajo|Hijo incapacitado|C[oó]nyuge)",
    )
    .unwrap()
});

static RE_MONTH_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"({m})\s*-\s*({m})", m = MONTHS)).unwrap());

static RE_PERCENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{1,3})\s*%").unwrap());

static RE_DEDUCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(Gastos\s+de\s+Educaci[oó]n|Cuotas\s+M[eé]dico\s+Asistenciales|Gastos\s+de\s+Adquisici[oó]n\s+de\s+Indumentaria[^\$\n]*?|Beneficios\s+para\s+Locatarios[^\$\n]*?)\s+\$\s*([\d.,]+)",
    )
    .unwrap()
});

static RE_DEDUCTION_PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"({m})(?:\s*-\s*({m}))?(?:\s+(\d+)\s*x)?(?:\s+\$)?\s*([\d.,]+)(?:\s+\$\s*([\d.,]+))?",
        m = MONTHS
    ))
    .unwrap()
});

static RE_DOLLAR_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*(-?[\d.,]+)").unwrap());

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Who the form belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    pub cuil: String,
    pub name: String,
}

/// One output line before it is turned into sheet cells.
#[derive(Debug, Clone, PartialEq)]
struct FormRow {
    concept: String,
    period: String,
    quantity: String,
    unit_amount: Cell,
    total: Cell,
}

impl FormRow {
    fn placeholder() -> Self {
        Self {
            concept: "-".to_string(),
            period: NOT_AVAILABLE.to_string(),
            quantity: String::new(),
            unit_amount: Cell::text(NOT_AVAILABLE),
            total: Cell::text(NOT_AVAILABLE),
        }
    }
}

pub struct TaxFormExtractor {
    pdf: Arc<PdfTextExtractor>,
}

impl TaxFormExtractor {
    pub fn new(pdf: Arc<PdfTextExtractor>) -> Self {
        Self { pdf }
    }
}

impl Extractor for TaxFormExtractor {
    fn tool(&self) -> Tool {
        Tool::TaxForm
    }

    fn extract(&self, file: &SourceFile) -> Result<Extraction, ExtractionError> {
        let text = self.pdf.extract(&file.bytes)?;
        parse_form(&file.filename, &text.text)
    }

    fn consolidate(&self, extractions: &[&Extraction]) -> Option<Sheet> {
        if extractions.is_empty() {
            return None;
        }

        let mut sheet = Sheet::new(SHEET_NAME, COLUMNS.to_vec());
        for row in extractions.iter().flat_map(|e| e.sheet.rows.iter()) {
            sheet.push_row(row.clone());
        }
        Some(sheet)
    }
}

pub fn parse_form(filename: &str, text: &str) -> Result<Extraction, ExtractionError> {
    let lines: Vec<String> = text
        .lines()
        .map(normalize_line)
        .filter(|l| !l.is_empty())
        .collect();

    let employee = employee(&lines).ok_or_else(|| {
        ExtractionError::Unrecognized("employee CUIL not found in form".to_string())
    })?;

    let sections = split_sections(&lines);
    if sections.is_empty() {
        return Err(ExtractionError::Unrecognized(
            "no numbered sections found in form".to_string(),
        ));
    }

    let mut sheet = Sheet::new(SHEET_NAME, COLUMNS.to_vec());
    for (number, body) in &sections {
        let label = section_label(*number);
        for row in section_rows(*number, body) {
            sheet.push_row(vec![
                Cell::Empty,
                Cell::text(employee.cuil.as_str()),
                Cell::text(employee.name.as_str()),
                Cell::text(label.as_str()),
                Cell::text(row.concept),
                Cell::text(row.period),
                Cell::text(row.quantity),
                row.unit_amount,
                row.total,
                Cell::text(filename),
            ]);
        }
    }

    tracing::debug!(
        filename = %filename,
        sections = sections.len(),
        rows = sheet.len(),
        "Parsed tax form"
    );

    Ok(Extraction::new(sheet, Some(format!("CUIL {}", employee.cuil))))
}

/// Employee CUIL and name from the form header, before any section starts.
fn employee(lines: &[String]) -> Option<Employee> {
    let header_end = lines
        .iter()
        .position(|l| RE_SECTION.is_match(l))
        .unwrap_or(lines.len());
    let header = lines[..header_end].join("\n");

    let cuil = RE_CUIL
        .captures(&header)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace('-', ""))?;

    let name = RE_NAME
        .captures(&header)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    Some(Employee { cuil, name })
}

/// Section number to body lines. Headers must appear in increasing order so
/// numbered lines inside a body are not taken for a new section.
fn split_sections(lines: &[String]) -> BTreeMap<u8, Vec<String>> {
    let mut sections: BTreeMap<u8, Vec<String>> = BTreeMap::new();
    let mut current: Option<u8> = None;

    for line in lines {
        let header = RE_SECTION
            .captures(line)
            .and_then(|c| c.get(1)?.as_str().parse::<u8>().ok())
            .filter(|n| current.is_none_or(|c| *n > c));

        match (header, current) {
            (Some(number), _) => {
                current = Some(number);
                sections.entry(number).or_default();
            }
            (None, Some(number)) => sections.entry(number).or_default().push(line.clone()),
            (None, None) => {}
        }
    }

    sections
}

fn section_label(number: u8) -> String {
    let name = SECTION_NAMES
        .get(usize::from(number).saturating_sub(1))
        .copied()
        .unwrap_or_default();
    format!("{} - {}", number, name)
}

fn section_rows(number: u8, body: &[String]) -> Vec<FormRow> {
    let content = body.join("\n");
    if body.is_empty() || RE_NOTHING_DECLARED.is_match(&content) {
        return vec![FormRow::placeholder()];
    }

    let rows = match number {
        1 => dependents(body),
        3 => deductions(&content),
        _ => Vec::new(),
    };

    let rows = if rows.is_empty() { amount_lines(body) } else { rows };
    if rows.is_empty() {
        vec![FormRow::placeholder()]
    } else {
        rows
    }
}

fn dependents(body: &[String]) -> Vec<FormRow> {
    body.iter()
        .filter_map(|line| {
            let caps = RE_DEPENDENT.captures(line)?;
            let whole = caps.get(0)?;
            let cuil = caps.get(1)?.as_str().replace('-', "");
            let name = line[..whole.start()].trim().trim_end_matches([',', '-', '|']).trim();

            let birth = RE_BIRTH_DATE
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            let relationship = RE_RELATIONSHIP
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            let period = RE_MONTH_RANGE
                .captures(line)
                .map(|c| format!("{} - {}", &c[1], &c[2]))
                .unwrap_or_else(|| FULL_YEAR.to_string());
            let percent = RE_PERCENT
                .captures(line)
                .map(|c| format!("{}%", &c[1]))
                .unwrap_or_else(|| "100%".to_string());

            let mut concept = vec![name.to_string(), format!("CUIL: {}", cuil)];
            if !birth.is_empty() {
                concept.push(format!("Nac: {}", birth));
            }
            if !relationship.is_empty() {
                concept.push(relationship);
            }

            Some(FormRow {
                concept: concept.join(" | "),
                period,
                quantity: String::new(),
                unit_amount: Cell::text(NOT_AVAILABLE),
                total: Cell::text(percent),
            })
        })
        .collect()
}

/// Deduction concepts with their declared total, each followed by the
/// monthly detail found before the next concept.
fn deductions(content: &str) -> Vec<FormRow> {
    let mut concepts: Vec<(String, String, usize, usize)> = Vec::new();
    for caps in RE_DEDUCTION.captures_iter(content) {
        let (Some(whole), Some(name), Some(total)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let name = RE_WHITESPACE.replace_all(name.as_str().trim(), " ").into_owned();
        if concepts.iter().any(|(existing, ..)| *existing == name) {
            continue;
        }
        concepts.push((name, total.as_str().to_string(), whole.start(), whole.end()));
    }

    let mut rows = Vec::new();
    for (i, (name, total, _, end)) in concepts.iter().enumerate() {
        rows.push(FormRow {
            concept: name.clone(),
            period: NOT_AVAILABLE.to_string(),
            quantity: String::new(),
            unit_amount: Cell::text(NOT_AVAILABLE),
            total: amount_cell(total),
        });

        let detail_end = concepts
            .get(i + 1)
            .map(|(_, _, start, _)| *start)
            .unwrap_or(content.len());
        let detail = &content[*end..detail_end];

        for caps in RE_DEDUCTION_PERIOD.captures_iter(detail) {
            let mut period = caps[1].to_string();
            if let Some(to) = caps.get(2) {
                period = format!("{} - {}", period, to.as_str());
            }
            let quantity = caps
                .get(3)
                .map(|q| format!("x{}", q.as_str()))
                .unwrap_or_default();

            let (unit_amount, period_total) = match caps.get(5) {
                Some(total) => (amount_cell(&caps[4]), amount_cell(total.as_str())),
                None => (Cell::Empty, amount_cell(&caps[4])),
            };

            rows.push(FormRow {
                concept: name.clone(),
                period,
                quantity,
                unit_amount,
                total: period_total,
            });
        }
    }

    rows
}

/// One row per line carrying a `$` amount; the text before the amount is the concept.
fn amount_lines(body: &[String]) -> Vec<FormRow> {
    body.iter()
        .filter_map(|line| {
            let caps = RE_DOLLAR_AMOUNT.captures(line)?;
            let whole = caps.get(0)?;
            let concept = line[..whole.start()].trim();

            Some(FormRow {
                concept: if concept.is_empty() {
                    "-".to_string()
                } else {
                    concept.to_string()
                },
                period: NOT_AVAILABLE.to_string(),
                quantity: String::new(),
                unit_amount: Cell::text(NOT_AVAILABLE),
                total: amount_cell(&caps[1]),
            })
        })
        .collect()
}

/// Argentine-format amounts become numbers; anything else is kept as text.
fn amount_cell(raw: &str) -> Cell {
    let raw = raw.trim().trim_end_matches('.');
    match parse_amount(raw) {
        Some(value) => Cell::Number(value),
        None => Cell::text(raw),
    }
}
