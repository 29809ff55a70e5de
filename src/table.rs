//! In-memory table model
//!
//! A `Table` is an ordered list of named columns of equal length. Tables are
//! built once from a provider response and never mutated afterwards; a reload
//! replaces the whole table.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum TableError {
    #[error("column '{column}' has {found} cells, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
}

/// Digit groups separated by commas, optionally followed by a dot decimal
/// part: `1,234`, `-12,000.5`.
static COMMA_GROUPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d{1,3}(,\d{3})+(\.\d+)?$").expect("static regex"));

/// Digit groups separated by dots with a comma decimal part: `1.234,50`.
static DOT_GROUPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d{1,3}(\.\d{3})+,\d+$").expect("static regex"));

/// A single comma as the decimal separator: `98,50`, `12,5`.
static DECIMAL_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+,\d+$").expect("static regex"));

/// A single cell value.
///
/// Provider values stay `Text` exactly as received and are read as numbers
/// only when a query asks for one; `Number` holds computed aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Text(String),
    Number(f64),
    Missing,
}

impl Cell {
    /// Wrap a raw spreadsheet value. Blank strings become `Missing`,
    /// everything else is kept verbatim as `Text`.
    pub fn parse(raw: &str) -> Cell {
        if raw.trim().is_empty() {
            Cell::Missing
        } else {
            Cell::Text(raw.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Numeric reading of the cell; `None` for missing cells and text that
    /// is not a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(text) => parse_number(text),
            Cell::Missing => None,
        }
    }

    /// Text used for substring matching and grouping; `None` for missing cells.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Cell::Missing => None,
            other => Some(other.to_string()),
        }
    }
}

/// Read a number the way spreadsheets print one. Comma followed by exactly
/// three digits is a thousands separator; any other single comma is a
/// decimal separator.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();

    let normalized = if COMMA_GROUPED.is_match(trimmed) {
        trimmed.replace(',', "")
    } else if DOT_GROUPED.is_match(trimmed) {
        trimmed.replace('.', "").replace(',', ".")
    } else if DECIMAL_COMMA.is_match(trimmed) {
        trimmed.replace(',', ".")
    } else {
        trimmed.to_string()
    };

    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{:.0}", n),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Missing => write!(f, "-"),
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Build a table, checking that every column has the same length and that
    /// names are unique.
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let row_count = columns.first().map(|c| c.cells.len()).unwrap_or(0);

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(TableError::DuplicateColumn(column.name.clone()));
            }
            if column.cells.len() != row_count {
                return Err(TableError::RaggedColumn {
                    column: column.name.clone(),
                    expected: row_count,
                    found: column.cells.len(),
                });
            }
        }

        Ok(Self { columns, row_count })
    }

    /// Build a table from a header row and raw string rows, the shape spreadsheet
    /// APIs return. Short rows are padded with missing cells; cells beyond the
    /// header are dropped.
    pub fn from_rows(header: &[String], rows: &[Vec<String>]) -> Result<Self, TableError> {
        let columns = header
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let cells = rows
                    .iter()
                    .map(|row| row.get(idx).map(|raw| Cell::parse(raw)).unwrap_or(Cell::Missing))
                    .collect();
                Column::new(name.trim(), cells)
            })
            .collect();

        Self::new(columns)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0 || self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn cell(&self, column: &str, row: usize) -> Option<&Cell> {
        self.column(column).and_then(|c| c.cells.get(row))
    }

    /// Copy the given rows, in the given order, into a new table.
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let cells = rows
                    .iter()
                    .map(|&r| c.cells.get(r).cloned().unwrap_or(Cell::Missing))
                    .collect();
                Column::new(c.name.clone(), cells)
            })
            .collect();

        Table {
            columns,
            row_count: rows.len(),
        }
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Table {
        let rows: Vec<usize> = (0..n.min(self.row_count)).collect();
        self.select_rows(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cell_parse_keeps_raw_text() {
        assert_eq!(Cell::parse(""), Cell::Missing);
        assert_eq!(Cell::parse("   "), Cell::Missing);
        assert_eq!(Cell::parse("Caneta"), Cell::Text("Caneta".to_string()));
        assert_eq!(Cell::parse("007"), Cell::Text("007".to_string()));
        assert_eq!(Cell::parse("007").to_string(), "007");
        assert_eq!(Cell::parse("98,50").to_string(), "98,50");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("10"), Some(10.0));
        assert_eq!(parse_number(" 2.5 "), Some(2.5));
        assert_eq!(parse_number("007"), Some(7.0));
        assert_eq!(parse_number("12,5"), Some(12.5));
        assert_eq!(parse_number("98,50"), Some(98.5));
        assert_eq!(parse_number("1234,567"), Some(1234.567));
        assert_eq!(parse_number("-3,25"), Some(-3.25));
        assert_eq!(parse_number("Caneta"), None);
        assert_eq!(parse_number("1,234,5"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn test_parse_number_thousands_groups() {
        assert_eq!(parse_number("1,234"), Some(1234.0));
        assert_eq!(parse_number("2,000"), Some(2000.0));
        assert_eq!(parse_number("1,234,567.5"), Some(1234567.5));
        assert_eq!(parse_number("-12,000"), Some(-12000.0));
        assert_eq!(parse_number("1.234,50"), Some(1234.5));
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Number(13.0).to_string(), "13");
        assert_eq!(Cell::Number(2.5).to_string(), "2.5");
        assert_eq!(Cell::Missing.to_string(), "-");
        assert_eq!(Cell::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_from_rows_pads_and_truncates() {
        let header = strings(&["Produto", "Quantidade"]);
        let rows = vec![strings(&["Caneta", "10", "extra"]), strings(&["Caderno"])];

        let table = Table::from_rows(&header, &rows).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_names(), vec!["Produto", "Quantidade"]);
        assert_eq!(table.cell("Quantidade", 0).and_then(Cell::as_number), Some(10.0));
        assert_eq!(table.cell("Quantidade", 1), Some(&Cell::Missing));
    }

    #[test]
    fn test_new_rejects_malformed() {
        let dup = Table::new(vec![
            Column::new("a", vec![Cell::Missing]),
            Column::new("a", vec![Cell::Missing]),
        ]);
        assert_eq!(dup, Err(TableError::DuplicateColumn("a".to_string())));

        let ragged = Table::new(vec![
            Column::new("a", vec![Cell::Missing]),
            Column::new("b", vec![]),
        ]);
        assert!(matches!(ragged, Err(TableError::RaggedColumn { .. })));
    }

    #[test]
    fn test_head_and_select_rows() {
        let header = strings(&["x"]);
        let rows = vec![strings(&["1"]), strings(&["2"]), strings(&["3"])];
        let table = Table::from_rows(&header, &rows).unwrap();

        assert_eq!(table.head(2).row_count(), 2);
        assert_eq!(table.head(10).row_count(), 3);

        let picked = table.select_rows(&[2, 0]);
        assert_eq!(picked.cell("x", 0), Some(&Cell::from("3")));
        assert_eq!(picked.cell("x", 1), Some(&Cell::from("1")));
    }

    #[test]
    fn test_empty_table() {
        let table = Table::from_rows(&strings(&["a", "b"]), &[]).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.column_count(), 2);
    }
}
