//! Query result rows.

use crate::errors::MetricsError;
use chrono::{DateTime, Utc};

/// Format used when a timestamp cell becomes a label or info value.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One typed value in a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Cell {
    /// Numeric view of the cell. Null becomes NaN.
    pub fn to_f64(&self, column: &str) -> Result<f64, MetricsError> {
        match self {
            Cell::Null => Ok(f64::NAN),
            Cell::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Cell::Int(i) => Ok(*i as f64),
            Cell::Float(f) => Ok(*f),
            Cell::Text(s) => s.trim().parse::<f64>().map_err(|_| MetricsError::InvalidColumn {
                column: column.to_string(),
                reason: format!("'{}' is not a number", s),
            }),
            Cell::Timestamp(_) => Err(MetricsError::InvalidColumn {
                column: column.to_string(),
                reason: "timestamp where a number was expected".to_string(),
            }),
        }
    }

    /// Text view of the cell. Null becomes the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Bool(b) => b.to_string(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<DateTime<Utc>> for Cell {
    fn from(value: DateTime<Utc>) -> Self {
        Cell::Timestamp(value)
    }
}

/// A result row: named cells in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Cell)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. Builder style, used by the decoders and by tests.
    pub fn with(mut self, column: impl Into<String>, cell: impl Into<Cell>) -> Self {
        self.push(column, cell);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, cell: impl Into<Cell>) {
        self.cells.push((column.into(), cell.into()));
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    /// Cell of `column`, if present.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    /// Cell of `column`, or `MissingColumn`.
    pub fn cell(&self, column: &str) -> Result<&Cell, MetricsError> {
        self.get(column)
            .ok_or_else(|| MetricsError::MissingColumn(column.to_string()))
    }

    pub fn number(&self, column: &str) -> Result<f64, MetricsError> {
        self.cell(column)?.to_f64(column)
    }

    pub fn text(&self, column: &str) -> Result<String, MetricsError> {
        Ok(self.cell(column)?.to_text())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_null_cells_map_to_nan_and_empty() {
        let row = Row::new().with("antall", Cell::Null);
        assert!(row.number("antall").unwrap().is_nan());
        assert_eq!(row.text("antall").unwrap(), "");
    }

    #[test]
    fn test_numeric_views() {
        let row = Row::new()
            .with("int", 42i64)
            .with("float", 0.5)
            .with("text", " 17 ")
            .with("flag", true);
        assert_eq!(row.number("int").unwrap(), 42.0);
        assert_eq!(row.number("float").unwrap(), 0.5);
        assert_eq!(row.number("text").unwrap(), 17.0);
        assert_eq!(row.number("flag").unwrap(), 1.0);
    }

    #[test]
    fn test_non_numeric_text_is_invalid_column() {
        let row = Row::new().with("antall", "mange");
        assert!(matches!(
            row.number("antall"),
            Err(MetricsError::InvalidColumn { column, .. }) if column == "antall"
        ));
    }

    #[test]
    fn test_missing_column() {
        let row = Row::new().with("gruppe", "bosatt");
        assert!(matches!(
            row.text("datasett"),
            Err(MetricsError::MissingColumn(c)) if c == "datasett"
        ));
    }

    #[test]
    fn test_timestamp_text_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 7, 5, 9).unwrap();
        let row = Row::new().with("latest_timestamp", ts);
        assert_eq!(row.text("latest_timestamp").unwrap(), "2024-03-01 07:05:09");
    }

    #[test]
    fn test_first_matching_column_wins() {
        let row = Row::new().with("a", 1i64).with("a", 2i64);
        assert_eq!(row.number("a").unwrap(), 1.0);
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["a", "a"]);
    }
}
