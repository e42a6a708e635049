//! Bank statement movements: one row per dated line with trailing amounts,
//! plus opening and closing balance rows. The detected bank picks the
//! [`BankLayout`] that bounds the movements table and signs the amounts.

use std::cmp::Ordering;
use std::sync::{Arc, LazyLock};

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::error::ExtractionError;
use crate::extract::bank::{detect_bank, parse_filename, StatementMeta};
use crate::extract::layout::{layout_for, BankLayout, DateStyle, Direction, SignRule};
use crate::extract::text::{first_full_date_year, format_date, parse_amount, parse_date, preclean};
use crate::extract::{Extraction, Extractor};
use crate::processor::PdfTextExtractor;
use crate::sheet::{Cell, Sheet};
use crate::tool::Tool;
use crate::validate::SourceFile;

pub const COLUMNS: [&str; 13] = [
    "fecha",
    "mes",
    "año",
    "periodo",
    "detalle",
    "referencia",
    "debito",
    "credito",
    "saldo",
    "moneda",
    "empresa",
    "banco",
    "archivo",
];

const SHEET_NAME: &str = "Movimientos";

/// Header lines searched for a currency marker.
const CURRENCY_SCAN_LINES: usize = 60;

/// Amount columns at most: debit, credit, balance.
const MAX_AMOUNTS: usize = 3;

static RE_MOVEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}[/-]\d{1,2}(?:[/-]\d{2,4})?)\s+(.+)$").unwrap());

static RE_OPENING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bSALDO\s+(?:DEL\s+PER[IÍ]ODO\s+ANTERIOR|ANTERIOR|INICIAL|ULTIMO\s+EXTRACTO)\b",
    )
    .unwrap()
});

static RE_CLOSING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bSALDO\s+(?:AL|FINAL|DEL\s+PER[IÍ]ODO\s+ACTUAL|ACTUAL)\b").unwrap()
});

static RE_MONTH_NAME_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})[-/](ENE|FEB|MAR|ABR|MAY|JUN|JUL|AGO|SEP|SET|OCT|NOV|DIC)\b")
        .unwrap()
});

const MONTH_NAMES: [&str; 12] = [
    "ENE", "FEB", "MAR", "ABR", "MAY", "JUN", "JUL", "AGO", "SEP", "OCT", "NOV", "DIC",
];

/// Longest detail kept for multi-line operations.
const MAX_DETAIL_CHARS: usize = 250;

static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})\b").unwrap());

static RE_DOLLARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(U\$S|\bUSD\b|\bD[OÓ]LARES\b)").unwrap());

#[derive(Debug, Clone, PartialEq)]
struct Movement {
    date: Option<NaiveDate>,
    raw_date: String,
    detail: String,
    reference: Option<String>,
    debit: Option<f64>,
    credit: Option<f64>,
    balance: Option<f64>,
}

impl Movement {
    fn balance_row(detail: &str, balance: f64) -> Self {
        Self {
            date: None,
            raw_date: String::new(),
            detail: detail.to_string(),
            reference: None,
            debit: None,
            credit: None,
            balance: Some(balance),
        }
    }
}

pub struct BankStatementExtractor {
    pdf: Arc<PdfTextExtractor>,
}

impl BankStatementExtractor {
    pub fn new(pdf: Arc<PdfTextExtractor>) -> Self {
        Self { pdf }
    }
}

impl Extractor for BankStatementExtractor {
    fn tool(&self) -> Tool {
        Tool::BankStatements
    }

    fn extract(&self, file: &SourceFile) -> Result<Extraction, ExtractionError> {
        let text = self.pdf.extract(&file.bytes)?;
        if text.used_ocr {
            tracing::info!(filename = %file.filename, "Statement text obtained through OCR");
        }
        parse_statement(&file.filename, text.lines())
    }

    fn consolidate(&self, extractions: &[&Extraction]) -> Option<Sheet> {
        if extractions.is_empty() {
            return None;
        }

        let mut rows: Vec<Vec<Cell>> = extractions
            .iter()
            .flat_map(|e| e.sheet.rows.iter().cloned())
            .collect();
        rows.sort_by(|a, b| compare_rows(a, b));

        let mut sheet = Sheet::new(SHEET_NAME, COLUMNS.to_vec());
        for row in rows {
            sheet.push_row(row);
        }
        Some(sheet)
    }
}

/// Parses the text lines of one statement into a movements sheet.
pub fn parse_statement<'a>(
    filename: &str,
    lines: impl IntoIterator<Item = &'a str>,
) -> Result<Extraction, ExtractionError> {
    let lines = preclean(lines);
    let meta = parse_filename(filename);
    let bank = detect_bank(filename, &meta, &lines);
    let currency = detect_currency(&lines);
    let fallback_year = fallback_year(&meta, &lines);

    let layout = layout_for(&bank);
    let movements = parse_movements(&lines, fallback_year, layout);
    let movement_count = movements
        .iter()
        .filter(|m| m.debit.is_some() || m.credit.is_some())
        .count();

    if movement_count == 0 {
        return Err(ExtractionError::NoRecords(format!(
            "no movements recognized in {} line(s) (bank: {})",
            lines.len(),
            bank
        )));
    }

    let mut sheet = Sheet::new(SHEET_NAME, COLUMNS.to_vec());
    for movement in &movements {
        sheet.push_row(to_row(movement, &meta, &bank, &currency, filename));
    }

    tracing::debug!(
        filename = %filename,
        bank = %bank,
        layout = layout.code,
        movements = movement_count,
        "Parsed bank statement"
    );

    Ok(Extraction::new(sheet, Some(bank)))
}

fn detect_currency(lines: &[String]) -> String {
    let dollars = lines
        .iter()
        .take(CURRENCY_SCAN_LINES)
        .any(|l| RE_DOLLARS.is_match(l));
    let currency = if dollars { "USD" } else { "ARS" };
    currency.to_string()
}

/// Year for `dd/mm` dates: first full date in the text, else the filename period.
fn fallback_year(meta: &StatementMeta, lines: &[String]) -> Option<i32> {
    first_full_date_year(&lines.join("\n")).or_else(|| {
        RE_YEAR
            .captures(&meta.period)
            .and_then(|c| c.get(1)?.as_str().parse().ok())
    })
}

fn parse_movements(
    lines: &[String],
    fallback_year: Option<i32>,
    layout: &BankLayout,
) -> Vec<Movement> {
    let mut movements: Vec<Movement> = Vec::new();
    let mut previous_balance: Option<f64> = None;
    let mut opening_seen = false;
    let mut closing: Option<Movement> = None;
    let mut in_table = layout.table_start.is_empty();
    let mut operations = OperationBuffer::default();

    for line in lines {
        let upper = line.to_uppercase();

        if in_table && layout.ends_table(&upper) {
            break;
        }

        if RE_OPENING.is_match(line) {
            if let Some(balance) = last_amount(line) {
                if !opening_seen {
                    movements.push(Movement::balance_row("SALDO ANTERIOR", balance));
                    opening_seen = true;
                }
                previous_balance = Some(balance);
            }
            continue;
        }

        if RE_CLOSING.is_match(line) {
            if let Some(balance) = last_amount(line) {
                closing = Some(Movement::balance_row("SALDO FINAL", balance));
            }
            continue;
        }

        if !in_table {
            in_table = layout.starts_table(&upper);
            continue;
        }

        if layout.is_furniture(&upper) {
            continue;
        }

        let movement = match layout.dates {
            DateStyle::Numeric => dated_movement(line, fallback_year, layout, previous_balance),
            DateStyle::DayMonthName => {
                operations.push_line(line, fallback_year, layout, &mut previous_balance)
            }
        };

        if let Some(movement) = movement {
            if movement.balance.is_some() {
                previous_balance = movement.balance;
            }
            movements.push(movement);
        }
    }

    movements.extend(closing);
    backfill_balance_dates(&mut movements);
    movements
}

/// A line led by a numeric date with at least one trailing amount.
fn dated_movement(
    line: &str,
    fallback_year: Option<i32>,
    layout: &BankLayout,
    previous_balance: Option<f64>,
) -> Option<Movement> {
    let caps = RE_MOVEMENT.captures(line)?;
    let raw_date = caps.get(1)?.as_str();
    let (description, amounts) = split_amounts(caps.get(2)?.as_str());
    if amounts.is_empty() || description.is_empty() {
        return None;
    }

    let mut movement = Movement {
        date: parse_date(raw_date, fallback_year),
        raw_date: raw_date.to_string(),
        reference: reference(&description, layout),
        detail: description,
        debit: None,
        credit: None,
        balance: None,
    };
    classify(&mut movement, &amounts, previous_balance, layout);
    Some(movement)
}

/// Operations printed as `06-MAR` dates with the description spread over
/// the lines before the amounts.
#[derive(Debug, Default)]
struct OperationBuffer {
    detail: Vec<String>,
    date: Option<(String, Option<NaiveDate>)>,
}

impl OperationBuffer {
    fn push_line(
        &mut self,
        line: &str,
        fallback_year: Option<i32>,
        layout: &BankLayout,
        previous_balance: &mut Option<f64>,
    ) -> Option<Movement> {
        if let Some(caps) = RE_MONTH_NAME_DATE.captures(line) {
            let raw = caps.get(0).map(|m| m.as_str().to_uppercase()).unwrap_or_default();
            let date = month_name_date(&caps, fallback_year);
            self.date = Some((raw, date));
        }

        let body = RE_MONTH_NAME_DATE.replace(line, " ");
        let (description, amounts) = split_amounts(body.trim());
        if !description.is_empty() {
            self.detail.push(description);
        }

        match amounts.as_slice() {
            [] => None,
            [balance] => {
                self.detail.clear();
                *previous_balance = Some(*balance);
                None
            }
            _ => {
                let detail: String = self.detail.join(" ").chars().take(MAX_DETAIL_CHARS).collect();
                self.detail.clear();
                if detail.is_empty() {
                    return None;
                }

                let (raw_date, date) = self.date.clone().unwrap_or_default();
                let mut movement = Movement {
                    date,
                    raw_date,
                    reference: reference(&detail, layout),
                    detail,
                    debit: None,
                    credit: None,
                    balance: None,
                };
                classify(&mut movement, &amounts, *previous_balance, layout);
                Some(movement)
            }
        }
    }
}

fn month_name_date(caps: &regex::Captures<'_>, fallback_year: Option<i32>) -> Option<NaiveDate> {
    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let name = caps.get(2)?.as_str().to_uppercase();
    let name = if name == "SET" { "SEP".to_string() } else { name };
    let month = MONTH_NAMES.iter().position(|m| *m == name)? as u32 + 1;
    NaiveDate::from_ymd_opt(fallback_year?, month, day)
}

/// Splits trailing amount tokens off a line body. Returns the description
/// and up to three amounts in left-to-right order.
fn split_amounts(body: &str) -> (String, Vec<f64>) {
    let mut tokens: Vec<&str> = body.split_whitespace().collect();
    let mut amounts = Vec::new();

    while amounts.len() < MAX_AMOUNTS {
        match tokens.last() {
            Some(&"$") => {
                tokens.pop();
            }
            Some(token) => match parse_amount(token) {
                Some(value) => {
                    amounts.push(value);
                    tokens.pop();
                }
                None => break,
            },
            None => break,
        }
    }

    while tokens.last() == Some(&"$") {
        tokens.pop();
    }

    amounts.reverse();
    (tokens.join(" "), amounts)
}

fn last_amount(line: &str) -> Option<f64> {
    line.split_whitespace().rev().find_map(parse_amount)
}

/// Last purely numeric token whose length fits the layout's reference range.
fn reference(description: &str, layout: &BankLayout) -> Option<String> {
    description
        .split_whitespace()
        .rev()
        .find(|t| layout.is_reference(t))
        .map(str::to_string)
}

fn classify(
    movement: &mut Movement,
    amounts: &[f64],
    previous_balance: Option<f64>,
    layout: &BankLayout,
) {
    let forced = layout
        .keyword_direction(&movement.detail)
        .map(|d| d == Direction::Debit);

    match *amounts {
        [debit, credit, balance] => {
            movement.debit = (debit != 0.0).then_some(debit.abs());
            movement.credit = (credit != 0.0).then_some(credit.abs());
            movement.balance = Some(balance);
        }
        [amount, balance] => {
            let is_debit = forced.unwrap_or_else(|| match (layout.sign, previous_balance) {
                (SignRule::BalanceDelta, Some(previous)) => balance < previous - 0.005,
                _ => amount < 0.0,
            });
            set_amount(movement, amount, is_debit);
            movement.balance = Some(balance);
        }
        [amount] => set_amount(movement, amount, forced.unwrap_or(amount < 0.0)),
        _ => {}
    }
}

fn set_amount(movement: &mut Movement, amount: f64, is_debit: bool) {
    if is_debit {
        movement.debit = Some(amount.abs());
    } else {
        movement.credit = Some(amount.abs());
    }
}

/// Opening balance takes the first movement date, closing the last.
fn backfill_balance_dates(movements: &mut [Movement]) {
    let first = movements.iter().find_map(|m| m.date);
    let last = movements.iter().rev().find_map(|m| m.date);

    for movement in movements.iter_mut() {
        match movement.detail.as_str() {
            "SALDO ANTERIOR" if movement.date.is_none() => movement.date = first,
            "SALDO FINAL" if movement.date.is_none() => movement.date = last,
            _ => {}
        }
    }
}

fn to_row(
    movement: &Movement,
    meta: &StatementMeta,
    bank: &str,
    currency: &str,
    filename: &str,
) -> Vec<Cell> {
    let (fecha, mes, anio) = match movement.date {
        Some(date) => (
            Cell::text(format_date(date)),
            Cell::Number(date.month() as f64),
            Cell::Number(date.year() as f64),
        ),
        None => (Cell::text(movement.raw_date.as_str()), Cell::Empty, Cell::Empty),
    };

    let periodo = if !meta.period.is_empty() {
        meta.period.clone()
    } else {
        movement
            .date
            .map(|d| format!("{:02}/{}", d.month(), d.year()))
            .unwrap_or_default()
    };

    vec![
        fecha,
        mes,
        anio,
        Cell::text(periodo),
        Cell::text(movement.detail.as_str()),
        Cell::text(movement.reference.clone().unwrap_or_default()),
        Cell::number(movement.debit),
        Cell::number(movement.credit),
        Cell::number(movement.balance),
        Cell::text(currency),
        Cell::text(meta.company.as_str()),
        Cell::text(bank),
        Cell::text(filename),
    ]
}

const COL_FECHA: usize = 0;
const COL_MES: usize = 1;
const COL_ANIO: usize = 2;
const COL_BANCO: usize = 11;

/// Bank, then year, then month, then day.
fn compare_rows(a: &[Cell], b: &[Cell]) -> Ordering {
    let text = |row: &[Cell], idx: usize| row.get(idx).map(|c| c.to_string()).unwrap_or_default();
    let number = |row: &[Cell], idx: usize| row.get(idx).and_then(Cell::as_number);
    let date = |row: &[Cell]| {
        row.get(COL_FECHA)
            .and_then(|c| parse_date(&c.to_string(), None))
    };

    text(a, COL_BANCO)
        .cmp(&text(b, COL_BANCO))
        .then_with(|| number(a, COL_ANIO).partial_cmp(&number(b, COL_ANIO)).unwrap_or(Ordering::Equal))
        .then_with(|| number(a, COL_MES).partial_cmp(&number(b, COL_MES)).unwrap_or(Ordering::Equal))
        .then_with(|| date(a).cmp(&date(b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::pdf_with_lines;

    fn statement_lines() -> Vec<&'static str> {
        vec![
            "BANCO CREDICOOP",
            "Resumen de cuenta corriente en pesos",
            "Periodo del 01/07/2024 al 31/07/2024",
            "Hoja 1 / 2",
            "SALDO ANTERIOR 100.000,00",
            "01/07 TRANSFERENCIA RECIBIDA 00123456 15.000,00 115.000,00",
            "03/07 DEBITO AUTOMATICO SEGURO $ 2.500,00 112.500,00",
            "05/07/2024 COMISION MANTENIMIENTO -1.200,50",
            "Texto sin movimientos",
            "10/07 PAGO PROVEEDOR 10.000,00 0,00 102.500,00",
            "SALDO FINAL 101.299,50",
        ]
    }

    #[test]
    fn test_parses_movements_and_balances() {
        let extraction =
            parse_statement("ACME-CREDICOOP-07+2024.pdf", statement_lines()).unwrap();
        let sheet = &extraction.sheet;

        assert_eq!(extraction.detail.as_deref(), Some("CREDICOOP"));
        assert_eq!(sheet.columns, COLUMNS.to_vec());
        assert_eq!(sheet.len(), 6);

        assert_eq!(sheet.cell(0, "detalle"), Some(&Cell::text("SALDO ANTERIOR")));
        assert_eq!(sheet.cell(0, "saldo"), Some(&Cell::Number(100000.0)));
        assert_eq!(sheet.cell(0, "fecha"), Some(&Cell::text("01/07/2024")));

        assert_eq!(sheet.cell(1, "fecha"), Some(&Cell::text("01/07/2024")));
        assert_eq!(sheet.cell(1, "credito"), Some(&Cell::Number(15000.0)));
        assert_eq!(sheet.cell(1, "debito"), Some(&Cell::Empty));
        assert_eq!(sheet.cell(1, "referencia"), Some(&Cell::text("00123456")));
        assert_eq!(sheet.cell(1, "mes"), Some(&Cell::Number(7.0)));
        assert_eq!(sheet.cell(1, "año"), Some(&Cell::Number(2024.0)));

        assert_eq!(sheet.cell(2, "debito"), Some(&Cell::Number(2500.0)));
        assert_eq!(
            sheet.cell(2, "detalle"),
            Some(&Cell::text("DEBITO AUTOMATICO SEGURO"))
        );

        assert_eq!(sheet.cell(3, "debito"), Some(&Cell::Number(1200.5)));
        assert_eq!(sheet.cell(3, "saldo"), Some(&Cell::Empty));

        assert_eq!(sheet.cell(4, "debito"), Some(&Cell::Number(10000.0)));
        assert_eq!(sheet.cell(4, "credito"), Some(&Cell::Empty));
        assert_eq!(sheet.cell(4, "saldo"), Some(&Cell::Number(102500.0)));

        assert_eq!(sheet.cell(5, "detalle"), Some(&Cell::text("SALDO FINAL")));
        assert_eq!(sheet.cell(5, "fecha"), Some(&Cell::text("10/07/2024")));
    }

    #[test]
    fn test_metadata_columns() {
        let extraction =
            parse_statement("ACME-CREDICOOP-07+2024.pdf", statement_lines()).unwrap();
        let sheet = &extraction.sheet;

        assert_eq!(sheet.cell(1, "empresa"), Some(&Cell::text("Acme")));
        assert_eq!(sheet.cell(1, "banco"), Some(&Cell::text("CREDICOOP")));
        assert_eq!(sheet.cell(1, "periodo"), Some(&Cell::text("07/2024")));
        assert_eq!(sheet.cell(1, "moneda"), Some(&Cell::text("ARS")));
        assert_eq!(
            sheet.cell(1, "archivo"),
            Some(&Cell::text("ACME-CREDICOOP-07+2024.pdf"))
        );
    }

    #[test]
    fn test_two_amounts_without_previous_balance_use_sign() {
        let lines = vec!["02/01/2024 RETIRO CAJERO -3.000,00 7.000,00"];
        let extraction = parse_statement("resumen.pdf", lines).unwrap();

        assert_eq!(extraction.sheet.cell(0, "debito"), Some(&Cell::Number(3000.0)));
        assert_eq!(extraction.detail.as_deref(), Some("GENERICO"));
    }

    #[test]
    fn test_galicia_signs_by_amount_not_balance() {
        let lines = vec![
            "BANCO GALICIA",
            "SALDO ANTERIOR 10.000,00",
            "02/07/24 TRANSFERENCIA A TERCEROS -2.500,00 7.500,00",
            "03/07/24 DEPOSITO EFECTIVO 1.000,00 8.500,00",
            // balance went down, but the amount is unsigned so it stays a credit
            "04/07/24 AJUSTE 300,00 8.200,00",
        ];
        let extraction = parse_statement("resumen.pdf", lines).unwrap();
        let sheet = &extraction.sheet;

        assert_eq!(extraction.detail.as_deref(), Some("GALICIA"));
        assert_eq!(sheet.cell(1, "fecha"), Some(&Cell::text("02/07/2024")));
        assert_eq!(sheet.cell(1, "debito"), Some(&Cell::Number(2500.0)));
        assert_eq!(sheet.cell(2, "credito"), Some(&Cell::Number(1000.0)));
        assert_eq!(sheet.cell(3, "credito"), Some(&Cell::Number(300.0)));
        assert_eq!(sheet.cell(3, "debito"), Some(&Cell::Empty));
    }

    #[test]
    fn test_mercadopago_table_keywords_and_reference() {
        let lines = vec![
            "Mercado Pago",
            "Resumen de cuenta",
            "01-02-2024 ENCABEZADO FUERA DE TABLA 999,00 999,00",
            "DETALLE DE MOVIMIENTOS",
            "Fecha Descripción ID de la operación Valor Saldo",
            "01-02-2024 Pago con QR Kiosco 12345678901 $ 1.500,00 $ 8.500,00",
            "02-02-2024 Transferencia recibida Juan 23456789012 $ 3.000,00 $ 11.500,00",
            "03-02-2024 Rendimientos 34567890123 $ 12,50 $ 11.512,50",
        ];
        let extraction = parse_statement("resumen.pdf", lines).unwrap();
        let sheet = &extraction.sheet;

        assert_eq!(extraction.detail.as_deref(), Some("MERCADOPAGO"));
        assert_eq!(sheet.len(), 3);

        assert_eq!(sheet.cell(0, "detalle"), Some(&Cell::text("Pago con QR Kiosco 12345678901")));
        assert_eq!(sheet.cell(0, "debito"), Some(&Cell::Number(1500.0)));
        assert_eq!(sheet.cell(0, "referencia"), Some(&Cell::text("12345678901")));
        assert_eq!(sheet.cell(0, "saldo"), Some(&Cell::Number(8500.0)));

        assert_eq!(sheet.cell(1, "credito"), Some(&Cell::Number(3000.0)));
        assert_eq!(sheet.cell(2, "credito"), Some(&Cell::Number(12.5)));
        assert_eq!(sheet.cell(2, "fecha"), Some(&Cell::text("03/02/2024")));
    }

    #[test]
    fn test_mercadopago_without_table_marker_has_no_records() {
        let lines = vec!["Mercado Pago", "01-02-2024 Pago con QR 12345678901 1.500,00 8.500,00"];

        assert!(matches!(
            parse_statement("resumen.pdf", lines),
            Err(ExtractionError::NoRecords(_))
        ));
    }

    #[test]
    fn test_galicia_mas_multiline_operations() {
        let lines = vec![
            "Galicia Más",
            "Periodo 01/03/2025 al 31/03/2025",
            "DETALLE DE OPERACIONES",
            "SALDO ANTERIOR 50.000,00",
            "06-MAR COMPRA DEBITO",
            "SUPERMERCADO NORTE 1.500,00 0,00 48.500,00",
            "07-MAR TRANSFERENCIA RECIBIDA",
            "CLIENTE SA 0,00 2.000,00 50.500,00",
            "10-MAR ACREDITACION HABERES 5.000,00 55.500,00",
            "SALDO FINAL 55.500,00",
        ];
        let extraction = parse_statement("resumen.pdf", lines).unwrap();
        let sheet = &extraction.sheet;

        assert_eq!(extraction.detail.as_deref(), Some("GALICIA_MAS"));
        assert_eq!(sheet.len(), 5);

        assert_eq!(sheet.cell(1, "fecha"), Some(&Cell::text("06/03/2025")));
        assert_eq!(
            sheet.cell(1, "detalle"),
            Some(&Cell::text("COMPRA DEBITO SUPERMERCADO NORTE"))
        );
        assert_eq!(sheet.cell(1, "debito"), Some(&Cell::Number(1500.0)));
        assert_eq!(sheet.cell(1, "saldo"), Some(&Cell::Number(48500.0)));

        assert_eq!(sheet.cell(2, "fecha"), Some(&Cell::text("07/03/2025")));
        assert_eq!(sheet.cell(2, "credito"), Some(&Cell::Number(2000.0)));

        assert_eq!(sheet.cell(3, "detalle"), Some(&Cell::text("ACREDITACION HABERES")));
        assert_eq!(sheet.cell(3, "credito"), Some(&Cell::Number(5000.0)));
        assert_eq!(sheet.cell(3, "mes"), Some(&Cell::Number(3.0)));

        assert_eq!(sheet.cell(4, "detalle"), Some(&Cell::text("SALDO FINAL")));
    }

    #[test]
    fn test_comafi_stops_at_table_end() {
        let lines = vec![
            "BANCO COMAFI",
            "DETALLE DE MOVIMIENTOS",
            "SALDO ANTERIOR 1.000,00",
            "01/04/2024 COMISION MANTENIMIENTO 0001234567890 100,00 900,00",
            "02/04/2024 TRANSFERENCIA RECIBIDA SERVICIO 50,00 950,00",
            "IMPUESTOS DEBITADOS EN EL PERIODO",
            "03/04/2024 IVA 21,00 929,00",
        ];
        let extraction = parse_statement("resumen.pdf", lines).unwrap();
        let sheet = &extraction.sheet;

        assert_eq!(extraction.records, 3);
        assert_eq!(sheet.cell(1, "debito"), Some(&Cell::Number(100.0)));
        assert_eq!(sheet.cell(1, "referencia"), Some(&Cell::text("0001234567890")));
        assert_eq!(sheet.cell(2, "credito"), Some(&Cell::Number(50.0)));
    }

    #[test]
    fn test_dollar_statement() {
        let lines = vec![
            "Caja de ahorro en U$S",
            "02/01/2024 DEPOSITO 500,00 1.500,00",
        ];
        let extraction = parse_statement("resumen.pdf", lines).unwrap();

        assert_eq!(extraction.sheet.cell(0, "moneda"), Some(&Cell::text("USD")));
    }

    #[test]
    fn test_no_movements_is_error() {
        let lines = vec!["BANCO MACRO", "SALDO ANTERIOR 1.000,00", "Sin movimientos"];

        match parse_statement("resumen.pdf", lines) {
            Err(ExtractionError::NoRecords(msg)) => assert!(msg.contains("MACRO"), "got: {}", msg),
            other => panic!("Expected NoRecords error, got {:?}", other),
        }
    }

    #[test]
    fn test_split_amounts_skips_currency_signs() {
        let (description, amounts) = split_amounts("COMPRA $ 1.000,00 $ 9.000,00");
        assert_eq!(description, "COMPRA");
        assert_eq!(amounts, vec![1000.0, 9000.0]);

        let (description, amounts) = split_amounts("PLAZO FIJO 30 DIAS");
        assert_eq!(description, "PLAZO FIJO 30 DIAS");
        assert!(amounts.is_empty());
    }

    #[test]
    fn test_consolidate_sorts_by_bank_then_date() {
        let macro_stmt = parse_statement(
            "resumen.pdf",
            vec!["BANCO MACRO", "15/03/2024 DEPOSITO 100,00 100,00"],
        )
        .unwrap();
        let galicia = parse_statement(
            "resumen.pdf",
            vec![
                "GALICIA",
                "20/02/2024 DEPOSITO 50,00 50,00",
                "10/02/2024 DEPOSITO 60,00 110,00",
            ],
        )
        .unwrap();

        let extractor = BankStatementExtractor::new(Arc::new(PdfTextExtractor::without_ocr()));
        let sheet = extractor.consolidate(&[&macro_stmt, &galicia]).unwrap();

        let banks: Vec<String> = (0..sheet.len())
            .map(|i| sheet.cell(i, "banco").unwrap().to_string())
            .collect();
        let dates: Vec<String> = (0..sheet.len())
            .map(|i| sheet.cell(i, "fecha").unwrap().to_string())
            .collect();

        assert_eq!(banks, vec!["GALICIA", "GALICIA", "MACRO"]);
        assert_eq!(dates, vec!["10/02/2024", "20/02/2024", "15/03/2024"]);
    }

    #[test]
    fn test_consolidate_nothing() {
        let extractor = BankStatementExtractor::new(Arc::new(PdfTextExtractor::without_ocr()));
        assert!(extractor.consolidate(&[]).is_none());
    }

    #[test]
    fn test_extract_from_pdf() {
        let bytes = pdf_with_lines(&[
            "BANCO DE LA NACION ARGENTINA",
            "01/07/2024 TRANSFERENCIA 1.000,00 2.000,00",
            "02/07/2024 COMISION 100,00 1.900,00",
        ]);
        let extractor = BankStatementExtractor::new(Arc::new(PdfTextExtractor::without_ocr()));
        let file = SourceFile::new("extracto.pdf", None, bytes);

        let extraction = extractor.extract(&file).unwrap();

        assert_eq!(extraction.records, 2);
        assert_eq!(extraction.detail.as_deref(), Some("NACION"));
        assert_eq!(extraction.sheet.cell(1, "debito"), Some(&Cell::Number(100.0)));
    }

    #[test]
    fn test_extract_corrupt_pdf_fails() {
        let extractor = BankStatementExtractor::new(Arc::new(PdfTextExtractor::without_ocr()));
        let file = SourceFile::new("broken.pdf", None, b"%PDF-1.4 garbage".to_vec());

        assert!(matches!(
            extractor.extract(&file),
            Err(ExtractionError::PdfProcessing(_))
        ));
    }
}
