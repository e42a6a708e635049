//! Minimal spreadsheet model plus an OOXML (`.xlsx`) writer and reader.

pub mod reader;
pub mod writer;

use std::fmt;

pub use reader::{read_first_sheet, Grid};
pub use writer::{save_workbook, workbook_bytes};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    pub fn number(value: Option<f64>) -> Self {
        value.map(Cell::Number).unwrap_or(Cell::Empty)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A named table: one header row and data rows of the same width.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new<S: Into<String>>(name: impl Into<String>, columns: Vec<S>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// `0 -> A`, `25 -> Z`, `26 -> AA`.
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// Columns in a worksheet, `A` through `XFD`.
pub const MAX_COLUMNS: usize = 16_384;

/// Inverse of [`column_letter`] for the letter prefix of a reference like `AB12`.
///
/// Returns `None` when there is no letter prefix or the column lies past `XFD`.
pub fn column_index(reference: &str) -> Option<usize> {
    let mut index = 0usize;
    let mut seen = false;

    for b in reference.bytes().take_while(|b| b.is_ascii_alphabetic()) {
        let digit = (b.to_ascii_uppercase() - b'A' + 1) as usize;
        index = index.checked_mul(26)?.checked_add(digit)?;
        if index > MAX_COLUMNS {
            return None;
        }
        seen = true;
    }

    seen.then(|| index - 1)
}
