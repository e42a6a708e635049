//! Reads the first worksheet of an `.xlsx` workbook into a grid of cells.
//!
//! Only values are read: shared strings, inline strings, numbers, booleans,
//! error codes and cached formula results. Styles (and therefore date
//! formatting) are ignored, so dates stored as serial numbers come back as
//! numbers.

use std::io::{Cursor, Read, Seek};

use quick_xml::de::from_str;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::SheetError;
use crate::sheet::{column_index, Cell};

/// Largest decompressed XML part that will be read.
const MAX_PART_BYTES: u64 = 64 * 1024 * 1024;

/// Cells materialized across the whole grid, padding included.
const MAX_CELLS: usize = 2_000_000;

/// Raw cell grid of one worksheet, rows in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Deserialize)]
struct WorkbookXml {
    #[serde(default)]
    sheets: SheetsXml,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsXml {
    #[serde(rename = "sheet", default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    #[serde(rename = "@name")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SharedStringsXml {
    #[serde(rename = "si", default)]
    items: Vec<StringItem>,
}

#[derive(Debug, Default, Deserialize)]
struct StringItem {
    t: Option<TextNode>,
    #[serde(rename = "r", default)]
    runs: Vec<RunXml>,
}

impl StringItem {
    fn text(&self) -> String {
        let mut text = self.t.as_ref().map(|t| t.value.clone()).unwrap_or_default();
        for run in &self.runs {
            if let Some(t) = &run.t {
                text.push_str(&t.value);
            }
        }
        text
    }
}

#[derive(Debug, Deserialize)]
struct RunXml {
    t: Option<TextNode>,
}

#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct WorksheetXml {
    #[serde(rename = "sheetData", default)]
    sheet_data: SheetDataXml,
}

#[derive(Debug, Default, Deserialize)]
struct SheetDataXml {
    #[serde(rename = "row", default)]
    rows: Vec<RowXml>,
}

#[derive(Debug, Deserialize)]
struct RowXml {
    #[serde(rename = "c", default)]
    cells: Vec<CellXml>,
}

#[derive(Debug, Deserialize)]
struct CellXml {
    #[serde(rename = "@r")]
    reference: Option<String>,
    #[serde(rename = "@t")]
    kind: Option<String>,
    v: Option<String>,
    is: Option<StringItem>,
}

pub fn read_first_sheet(bytes: &[u8]) -> Result<Grid, SheetError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| SheetError::Archive(e.to_string()))?;

    let workbook = read_part(&mut archive, "xl/workbook.xml")?;
    let name = parse::<WorkbookXml>("xl/workbook.xml", &workbook)?
        .sheets
        .sheets
        .into_iter()
        .find_map(|s| s.name)
        .unwrap_or_else(|| "Sheet1".to_string());

    let shared = match read_part(&mut archive, "xl/sharedStrings.xml") {
        Ok(xml) => parse::<SharedStringsXml>("xl/sharedStrings.xml", &xml)?
            .items
            .iter()
            .map(StringItem::text)
            .collect(),
        Err(SheetError::MissingPart(_)) => Vec::new(),
        Err(e) => return Err(e),
    };

    let part = first_worksheet_part(&archive)?;
    let xml = read_part(&mut archive, &part)?;
    let worksheet = parse::<WorksheetXml>("worksheet", &xml)?;

    let mut budget = MAX_CELLS;
    let rows = worksheet
        .sheet_data
        .rows
        .iter()
        .map(|row| decode_row(row, &shared, &mut budget))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Grid { name, rows })
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, SheetError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Err(SheetError::MissingPart(name.to_string())),
        Err(e) => return Err(SheetError::Archive(e.to_string())),
    };

    let mut content = String::new();
    file.by_ref()
        .take(MAX_PART_BYTES + 1)
        .read_to_string(&mut content)?;
    if content.len() as u64 > MAX_PART_BYTES {
        return Err(SheetError::PartTooLarge {
            part: name.to_string(),
            limit: MAX_PART_BYTES,
        });
    }
    Ok(content)
}

fn parse<T: DeserializeOwned>(part: &str, xml: &str) -> Result<T, SheetError> {
    from_str(xml).map_err(|e| SheetError::Xml {
        part: part.to_string(),
        message: e.to_string(),
    })
}

/// `xl/worksheets/sheetN.xml` with the smallest N.
fn first_worksheet_part<R: Read + Seek>(archive: &ZipArchive<R>) -> Result<String, SheetError> {
    archive
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix("xl/worksheets/sheet")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((number, name.to_string()))
        })
        .min_by_key(|(number, _)| *number)
        .map(|(_, name)| name)
        .ok_or_else(|| SheetError::MissingPart("xl/worksheets/sheet1.xml".to_string()))
}

fn decode_row(row: &RowXml, shared: &[String], budget: &mut usize) -> Result<Vec<Cell>, SheetError> {
    let mut cells: Vec<Cell> = Vec::with_capacity(row.cells.len().min(*budget));

    for cell in &row.cells {
        let col = match cell.reference.as_deref() {
            Some(r) if r.starts_with(|c: char| c.is_ascii_alphabetic()) => {
                column_index(r).ok_or_else(|| SheetError::CellReference(r.to_string()))?
            }
            _ => cells.len(),
        };

        if cells.len() <= col {
            let grow = col + 1 - cells.len();
            if grow > *budget {
                return Err(SheetError::TooManyCells(MAX_CELLS));
            }
            *budget -= grow;
            cells.resize(col + 1, Cell::Empty);
        }
        cells[col] = decode_cell(cell, shared);
    }

    Ok(cells)
}

fn decode_cell(cell: &CellXml, shared: &[String]) -> Cell {
    let value = cell.v.as_deref().map(str::trim);

    match cell.kind.as_deref() {
        Some("s") => value
            .and_then(|v| v.parse::<usize>().ok())
            .and_then(|idx| shared.get(idx))
            .map(|s| Cell::text(s.as_str()))
            .unwrap_or(Cell::Empty),
        Some("inlineStr") => cell
            .is
            .as_ref()
            .map(|is| Cell::text(is.text()))
            .unwrap_or(Cell::Empty),
        Some("b") => match value {
            Some("1") => Cell::text("TRUE"),
            Some("0") => Cell::text("FALSE"),
            _ => Cell::Empty,
        },
        Some("str") | Some("e") | Some("d") => {
            Cell::text(cell.v.clone().unwrap_or_default())
        }
        _ => match value {
            Some(v) if !v.is_empty() => v
                .parse::<f64>()
                .map(Cell::Number)
                .unwrap_or_else(|_| Cell::text(v)),
            _ => Cell::Empty,
        },
    }
}
