//! Tabular value model.
//!
//! A [`Table`] is an ordered list of [`Column`]s that all hold the same number
//! of [`Cell`]s. Tables are plain values: pipeline stages take a `&Table` and
//! hand back a new one, so the caller's original is never touched.

mod frame;

pub use frame::{read_csv, write_csv};

use crate::error::{CleaningError, Result};
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Cell
// ============================================================================

/// A single nullable value.
///
/// `Null` is distinct from an empty string.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cell {
    #[default]
    Null,
    Number(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Boolean(bool),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric view of the cell. Only `Number` cells have one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Cell::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Hashable identity used for duplicate detection and distinct counts.
    pub fn key(&self) -> CellKey {
        match self {
            Cell::Null => CellKey::Null,
            Cell::Number(v) => {
                let bits = if *v == 0.0 {
                    0.0f64.to_bits()
                } else if v.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    v.to_bits()
                };
                CellKey::Number(bits)
            }
            Cell::Text(s) => CellKey::Text(s.clone()),
            Cell::DateTime(dt) => CellKey::DateTime(*dt),
            Cell::Boolean(b) => CellKey::Boolean(*b),
        }
    }

    /// Render the cell as text, using `date_format` for timestamps.
    ///
    /// Returns `None` for null cells.
    pub fn render(&self, date_format: &str) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::DateTime(dt) => Some(dt.format(date_format).to_string()),
            other => Some(other.to_string()),
        }
    }

    /// The column type this cell variant belongs to.
    pub fn natural_type(&self) -> ColumnType {
        match self {
            Cell::Null => ColumnType::Unknown,
            Cell::Number(_) => ColumnType::Numeric,
            Cell::Text(_) => ColumnType::Text,
            Cell::DateTime(_) => ColumnType::DateTime,
            Cell::Boolean(_) => ColumnType::Boolean,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Number(v) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{:.0}", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            Cell::Text(s) => f.write_str(s),
            Cell::DateTime(dt) => {
                if dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 {
                    write!(f, "{}", dt.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))
                }
            }
            Cell::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Cell::Null
        } else {
            Cell::Number(value)
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

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Boolean(value)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Cell::DateTime(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Cell::Null, Into::into)
    }
}

/// Hashable identity of a [`Cell`]. Null equals null, `-0.0` equals `0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Null,
    Number(u64),
    Text(String),
    DateTime(NaiveDateTime),
    Boolean(bool),
}

// ============================================================================
// ColumnType
// ============================================================================

/// Semantic type of a column, assigned during preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Text,
    DateTime,
    Boolean,
    Categorical,
    #[default]
    Unknown,
}

impl ColumnType {
    /// Derive a type from the variants present in `cells`.
    ///
    /// A single variant maps to its natural type, mixed variants fall back to
    /// `Text`, and an all-null column is `Unknown`.
    pub fn from_cells(cells: &[Cell]) -> Self {
        let mut found: Option<ColumnType> = None;
        for cell in cells.iter().filter(|c| !c.is_null()) {
            let natural = cell.natural_type();
            match found {
                None => found = Some(natural),
                Some(t) if t == natural => {}
                Some(_) => return ColumnType::Text,
            }
        }
        found.unwrap_or(ColumnType::Unknown)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Text => "text",
            Self::DateTime => "datetime",
            Self::Boolean => "boolean",
            Self::Categorical => "categorical",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the column holds string-like values.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Text | Self::Categorical)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Column
// ============================================================================

/// A named, typed sequence of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    cells: Vec<Cell>,
}

impl Column {
    /// Build a column whose type is derived from its cell variants.
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        let column_type = ColumnType::from_cells(&cells);
        Self {
            name: name.into(),
            column_type,
            cells,
        }
    }

    pub fn with_type(name: impl Into<String>, column_type: ColumnType, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            column_type,
            cells,
        }
    }

    /// Convenience constructor from anything convertible into cells.
    pub fn from_values<T: Into<Cell>>(name: impl Into<String>, values: Vec<T>) -> Self {
        Self::new(name, values.into_iter().map(Into::into).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&Cell> {
        self.cells.get(row)
    }

    pub fn null_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_null()).count()
    }

    pub fn non_null_count(&self) -> usize {
        self.len() - self.null_count()
    }

    /// First `n` non-null cells, in row order.
    pub fn sample(&self, n: usize) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|c| !c.is_null()).take(n)
    }

    /// Non-null numeric values in row order.
    pub fn numeric_values(&self) -> Vec<f64> {
        self.cells.iter().filter_map(Cell::as_f64).collect()
    }

    /// Number of distinct non-null values.
    pub fn distinct_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| !c.is_null())
            .map(Cell::key)
            .collect::<std::collections::HashSet<_>>()
            .len()
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn retyped(mut self, column_type: ColumnType) -> Self {
        self.column_type = column_type;
        self
    }

    /// Replace the cells, keeping name and type.
    pub fn with_cells(mut self, cells: Vec<Cell>) -> Self {
        self.cells = cells;
        self
    }
}

// ============================================================================
// Table
// ============================================================================

/// An ordered set of equally long columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    height: usize,
}

impl Table {
    /// Build a table, checking that every column has the same length.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let height = columns.first().map_or(0, Column::len);
        if let Some(bad) = columns.iter().find(|c| c.len() != height) {
            return Err(CleaningError::RaggedTable {
                column: bad.name().to_string(),
                expected: height,
                actual: bad.len(),
            });
        }
        Ok(Self { columns, height })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width())
    }

    pub fn total_cells(&self) -> usize {
        self.height * self.width()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Look up a column, failing with `ColumnNotFound`.
    pub fn require_column(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| CleaningError::ColumnNotFound(name.to_string()))
    }

    /// Total null cells across the table.
    pub fn null_count(&self) -> usize {
        self.columns.iter().map(Column::null_count).sum()
    }

    /// Cells of one row, in column order.
    pub fn row(&self, index: usize) -> Vec<&Cell> {
        self.columns.iter().filter_map(|c| c.get(index)).collect()
    }

    /// Whether every cell of the row is null.
    pub fn row_is_empty(&self, index: usize) -> bool {
        self.columns
            .iter()
            .all(|c| c.get(index).is_none_or(Cell::is_null))
    }

    /// Whether any cell of the row is null.
    pub fn row_has_null(&self, index: usize) -> bool {
        self.columns
            .iter()
            .any(|c| c.get(index).is_some_and(Cell::is_null))
    }

    /// Hashable key of a row restricted to `column_indices`.
    pub fn row_key(&self, index: usize, column_indices: &[usize]) -> Vec<CellKey> {
        column_indices
            .iter()
            .map(|&c| self.columns[c].cells[index].key())
            .collect()
    }

    /// Keep the rows whose mask entry is `true`.
    pub fn filter_rows(&self, keep: &[bool]) -> Table {
        let columns: Vec<Column> = self
            .columns
            .iter()
            .map(|column| {
                let cells = column
                    .cells
                    .iter()
                    .zip(keep)
                    .filter(|(_, k)| **k)
                    .map(|(c, _)| c.clone())
                    .collect();
                column.clone().with_cells(cells)
            })
            .collect();
        let height = keep.iter().filter(|k| **k).count();
        Table { columns, height }
    }

    /// Insert a column, replacing any existing column with the same name.
    pub fn put_column(&mut self, column: Column) -> Result<()> {
        if !self.columns.is_empty() && column.len() != self.height {
            return Err(CleaningError::RaggedTable {
                column: column.name().to_string(),
                expected: self.height,
                actual: column.len(),
            });
        }
        if self.columns.is_empty() {
            self.height = column.len();
        }
        match self.column_index(column.name()) {
            Some(idx) => self.columns[idx] = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Replace the column at `index`. Names may repeat, so stages that rewrite
    /// columns in place address them by position.
    pub fn replace_column(&mut self, index: usize, column: Column) -> Result<()> {
        if column.len() != self.height {
            return Err(CleaningError::RaggedTable {
                column: column.name().to_string(),
                expected: self.height,
                actual: column.len(),
            });
        }
        let Some(slot) = self.columns.get_mut(index) else {
            return Err(CleaningError::ColumnNotFound(format!("#{}", index)));
        };
        *slot = column;
        Ok(())
    }

    /// Rename every column through `rename`, keeping order.
    pub fn rename_columns(&self, rename: impl Fn(&str) -> String) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let name = rename(c.name());
                c.clone().renamed(name)
            })
            .collect();
        Table {
            columns,
            height: self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_table() -> Table {
        Table::new(vec![
            Column::from_values("id", vec![1.0, 2.0, 3.0]),
            Column::from_values("name", vec![Some("a"), None, Some("c")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_ragged_table_rejected() {
        let result = Table::new(vec![
            Column::from_values("a", vec![1.0, 2.0]),
            Column::from_values("b", vec![1.0]),
        ]);
        assert!(matches!(result, Err(CleaningError::RaggedTable { .. })));
    }

    #[test]
    fn test_column_type_from_cells() {
        assert_eq!(
            ColumnType::from_cells(&[Cell::Number(1.0), Cell::Null]),
            ColumnType::Numeric
        );
        assert_eq!(
            ColumnType::from_cells(&[Cell::Number(1.0), Cell::from("x")]),
            ColumnType::Text
        );
        assert_eq!(ColumnType::from_cells(&[Cell::Null]), ColumnType::Unknown);
    }

    #[test]
    fn test_null_distinct_from_empty_string() {
        assert!(Cell::Null.is_null());
        assert!(!Cell::from("").is_null());
        assert_ne!(Cell::Null.key(), Cell::from("").key());
    }

    #[test]
    fn test_negative_zero_key() {
        assert_eq!(Cell::Number(-0.0).key(), Cell::Number(0.0).key());
    }

    #[test]
    fn test_filter_rows() {
        let table = sample_table();
        let filtered = table.filter_rows(&[true, false, true]);
        assert_eq!(filtered.height(), 2);
        assert_eq!(
            filtered.column("name").unwrap().cells(),
            &[Cell::from("a"), Cell::from("c")]
        );
    }

    #[test]
    fn test_put_column_replaces_by_name() {
        let mut table = sample_table();
        table
            .put_column(Column::from_values("id", vec![7.0, 8.0, 9.0]))
            .unwrap();
        assert_eq!(table.width(), 2);
        assert_eq!(table.column("id").unwrap().numeric_values(), vec![7.0, 8.0, 9.0]);

        let err = table.put_column(Column::from_values("x", vec![1.0]));
        assert!(err.is_err());
    }

    #[test]
    fn test_replace_column_addresses_by_position() {
        let mut table = Table::new(vec![
            Column::from_values("dup", vec![1.0, 2.0]),
            Column::from_values("dup", vec![3.0, 4.0]),
        ])
        .unwrap();
        table
            .replace_column(1, Column::from_values("dup", vec![5.0, 6.0]))
            .unwrap();

        assert_eq!(table.columns()[0].numeric_values(), vec![1.0, 2.0]);
        assert_eq!(table.columns()[1].numeric_values(), vec![5.0, 6.0]);
        assert!(table.replace_column(2, Column::from_values("x", vec![0.0, 0.0])).is_err());
        assert!(table.replace_column(0, Column::from_values("x", vec![0.0])).is_err());
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Number(3.0).to_string(), "3");
        assert_eq!(Cell::Number(2.5).to_string(), "2.5");
        let dt = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(Cell::DateTime(dt).to_string(), "2024-01-15");
        assert_eq!(Cell::DateTime(dt).render("%d/%m/%Y").unwrap(), "15/01/2024");
    }

    #[test]
    fn test_row_helpers() {
        let table = sample_table();
        assert!(table.row_has_null(1));
        assert!(!table.row_is_empty(1));
        assert_eq!(table.null_count(), 1);
        assert_eq!(table.row(0), vec![&Cell::Number(1.0), &Cell::from("a")]);
    }
}
