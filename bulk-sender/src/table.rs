//! In-memory contact table shared between wizard steps.

use std::fmt;

use crate::errors::DecodeError;

/// Name of the synthetic row-number column that heads every table.
pub const ROW_NUMBER_COLUMN: &str = "NUM";

/// Spreadsheet row number of the first data row (the header sits on row 1).
pub const FIRST_DATA_ROW: usize = 2;

/// A decoded cell value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(value) => write!(f, "{value}"),
            CellValue::Integer(value) => write!(f, "{value}"),
            CellValue::Float(value) => write!(f, "{value}"),
            CellValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

/// Ordered column headers plus positionally aligned rows.
///
/// The first column is always [`ROW_NUMBER_COLUMN`]. A table is built once per
/// load and never mutated afterwards; reloading replaces it.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    head: Vec<String>,
    body: Vec<Vec<CellValue>>,
}

impl Table {
    /// Builds a table from decoded records, prepending the row-number column.
    ///
    /// Data row `i` (0-based) is numbered `i + 2`. Rows shorter than `columns`
    /// are padded with [`CellValue::Empty`]; longer rows are rejected.
    pub fn from_records(
        columns: Vec<String>,
        rows: Vec<Vec<CellValue>>,
    ) -> Result<Self, DecodeError> {
        let width = columns.len();
        let mut head = Vec::with_capacity(width + 1);
        head.push(ROW_NUMBER_COLUMN.to_string());
        head.extend(columns);

        let mut body = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            let number = index + FIRST_DATA_ROW;
            if row.len() > width {
                return Err(DecodeError::RaggedRow {
                    row: number,
                    expected: width,
                    found: row.len(),
                });
            }
            let mut cells = Vec::with_capacity(width + 1);
            cells.push(CellValue::Text(number.to_string()));
            cells.extend(row);
            cells.resize(width + 1, CellValue::Empty);
            body.push(cells);
        }

        Ok(Self { head, body })
    }

    /// Wraps an already numbered header and body. Every row must have exactly
    /// as many cells as the header.
    pub fn from_parts(head: Vec<String>, body: Vec<Vec<CellValue>>) -> Result<Self, DecodeError> {
        for (index, row) in body.iter().enumerate() {
            if row.len() != head.len() {
                return Err(DecodeError::RaggedRow {
                    row: index + FIRST_DATA_ROW,
                    expected: head.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self { head, body })
    }

    pub fn head(&self) -> &[String] {
        &self.head
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Position of a column by exact name. Duplicate names resolve to the
    /// first occurrence.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.head.iter().position(|column| column == name)
    }

    /// Row number stored in the first cell of `row`, if it parses as an integer.
    pub fn row_number(row: &[CellValue]) -> Option<i64> {
        match row.first()? {
            CellValue::Integer(number) => Some(*number),
            CellValue::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}
