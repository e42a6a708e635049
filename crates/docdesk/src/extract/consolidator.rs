//! Merges the first worksheet of several `.xlsx` workbooks into one table.

use crate::error::ExtractionError;
use crate::extract::{Extraction, Extractor};
use crate::sheet::{read_first_sheet, Cell, Sheet};
use crate::tool::Tool;
use crate::validate::SourceFile;

pub const SOURCE_COLUMN: &str = "archivo";

const SHEET_NAME: &str = "Consolidado";

#[derive(Debug, Default)]
pub struct SpreadsheetConsolidator;

impl SpreadsheetConsolidator {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for SpreadsheetConsolidator {
    fn tool(&self) -> Tool {
        Tool::Consolidator
    }

    fn extract(&self, file: &SourceFile) -> Result<Extraction, ExtractionError> {
        let grid = read_first_sheet(&file.bytes)?;
        let mut rows = grid.rows.into_iter().filter(|row| !row.iter().all(Cell::is_empty));

        let header = rows.next().ok_or_else(|| {
            ExtractionError::NoRecords(format!("worksheet '{}' is empty", grid.name))
        })?;
        let mut columns = header_names(&header);
        let width = columns.len();
        columns.push(SOURCE_COLUMN.to_string());

        let mut sheet = Sheet::new(grid.name.as_str(), columns);
        for mut row in rows {
            row.resize(width, Cell::Empty);
            row.push(Cell::text(file.filename.as_str()));
            sheet.push_row(row);
        }

        if sheet.is_empty() {
            return Err(ExtractionError::NoRecords(format!(
                "worksheet '{}' has a header but no data rows",
                grid.name
            )));
        }

        let detail = format!("{} column(s) from sheet '{}'", width, grid.name);
        Ok(Extraction::new(sheet, Some(detail)))
    }

    fn consolidate(&self, extractions: &[&Extraction]) -> Option<Sheet> {
        if extractions.is_empty() {
            return None;
        }

        let mut columns: Vec<String> = Vec::new();
        for extraction in extractions {
            for column in &extraction.sheet.columns {
                if column != SOURCE_COLUMN && !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }
        columns.push(SOURCE_COLUMN.to_string());

        let mut sheet = Sheet::new(SHEET_NAME, columns.clone());
        for extraction in extractions {
            let positions: Vec<Option<usize>> = columns
                .iter()
                .map(|c| extraction.sheet.column_index(c))
                .collect();

            for row in &extraction.sheet.rows {
                sheet.push_row(
                    positions
                        .iter()
                        .map(|pos| pos.and_then(|i| row.get(i).cloned()).unwrap_or(Cell::Empty))
                        .collect(),
                );
            }
        }

        Some(sheet)
    }
}

/// Header cells as unique column names. Blank headers become `columna_N`
/// and repeats get a numeric suffix.
fn header_names(header: &[Cell]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(header.len());

    for (i, cell) in header.iter().enumerate() {
        let base = match cell.to_string().trim() {
            "" => format!("columna_{}", i + 1),
            name => name.to_string(),
        };

        let mut name = base.clone();
        let mut n = 2;
        while names.contains(&name) || name == SOURCE_COLUMN {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        names.push(name);
    }

    names
}
