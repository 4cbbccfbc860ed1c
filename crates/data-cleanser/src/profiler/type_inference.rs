//! Sample-based type inference and best-effort coercion.

use crate::config::{DEFAULT_DATE_FORMAT, DEFAULT_SAMPLE_SIZE};
use crate::table::{Cell, Column, ColumnType, Table};
use crate::types::{ActionRecord, StageOutput};
use crate::utils::{looks_like_date, parse_bool, parse_datetime, parse_number};
use tracing::{debug, warn};

pub(crate) const STAGE: &str = "preprocess";

/// Guesses a column's semantic type from its first non-null values.
#[derive(Debug, Clone)]
pub struct TypeInferencer {
    sample_size: usize,
    date_format: String,
}

impl Default for TypeInferencer {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_SIZE, DEFAULT_DATE_FORMAT)
    }
}

impl TypeInferencer {
    pub fn new(sample_size: usize, date_format: impl Into<String>) -> Self {
        Self {
            sample_size: sample_size.max(1),
            date_format: date_format.into(),
        }
    }

    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    /// Classify a column.
    ///
    /// Only the first `sample_size` non-null values are inspected, so a column
    /// that is numeric at the top but textual further down is still Numeric.
    pub fn infer(&self, column: &Column) -> ColumnType {
        let sample: Vec<&Cell> = column.sample(self.sample_size).collect();
        if sample.is_empty() {
            return ColumnType::Unknown;
        }

        // Typed loaders already did the work
        let first_type = sample[0].natural_type();
        if first_type != ColumnType::Text && sample.iter().all(|c| c.natural_type() == first_type) {
            return first_type;
        }

        let texts: Vec<String> = sample
            .iter()
            .filter_map(|c| c.render(&self.date_format))
            .collect();

        if texts.iter().any(|s| looks_like_date(s)) {
            return ColumnType::DateTime;
        }

        if texts.iter().all(|s| parse_number(s).is_some()) {
            return ColumnType::Numeric;
        }

        ColumnType::Text
    }

    /// Infer and coerce every column of the table.
    ///
    /// Emits one record per column. Values that cannot be coerced become null.
    pub fn apply(&self, table: &Table) -> StageOutput {
        let mut columns = Vec::with_capacity(table.width());
        let mut records = Vec::with_capacity(table.width());

        for column in table.columns() {
            let detected = self.infer(column);
            let (coerced, lost) = coerce_column(column, detected, &self.date_format);

            debug!("Column '{}' detected as {}", column.name(), detected);
            if lost > 0 {
                warn!(
                    "Column '{}': {} values could not be coerced to {} and were set to null",
                    column.name(),
                    lost,
                    detected
                );
            }

            let summary = if lost > 0 {
                format!("detected {} type, {} unconvertible values set to null", detected, lost)
            } else {
                format!("detected {} type", detected)
            };
            records.push(
                ActionRecord::success(STAGE, summary)
                    .for_column(column.name())
                    .with_values(lost),
            );
            columns.push(coerced);
        }

        // Coercion preserves length, so the table stays rectangular
        let table = Table::new(columns).unwrap_or_else(|_| table.clone());
        StageOutput {
            table,
            records,
            issues: Vec::new(),
        }
    }
}

/// Convert a single cell to `target`. Misses become null.
pub fn coerce_cell(cell: &Cell, target: ColumnType, date_format: &str) -> Cell {
    if cell.is_null() {
        return Cell::Null;
    }

    match target {
        ColumnType::Numeric => match cell {
            Cell::Number(v) => Cell::Number(*v),
            Cell::Text(s) => parse_number(s).map_or(Cell::Null, Cell::Number),
            Cell::Boolean(b) => Cell::Number(if *b { 1.0 } else { 0.0 }),
            _ => Cell::Null,
        },
        ColumnType::DateTime => match cell {
            Cell::DateTime(dt) => Cell::DateTime(*dt),
            Cell::Text(s) => parse_datetime(s, Some(date_format)).map_or(Cell::Null, Cell::DateTime),
            _ => Cell::Null,
        },
        ColumnType::Boolean => match cell {
            Cell::Boolean(b) => Cell::Boolean(*b),
            Cell::Text(s) => parse_bool(s).map_or(Cell::Null, Cell::Boolean),
            Cell::Number(v) if *v == 0.0 => Cell::Boolean(false),
            Cell::Number(v) if *v == 1.0 => Cell::Boolean(true),
            _ => Cell::Null,
        },
        ColumnType::Text | ColumnType::Categorical => match cell {
            Cell::Text(s) => Cell::Text(s.clone()),
            other => other.render(date_format).map_or(Cell::Null, Cell::Text),
        },
        ColumnType::Unknown => cell.clone(),
    }
}

/// Coerce a whole column, returning it with the number of values lost to null.
pub fn coerce_column(column: &Column, target: ColumnType, date_format: &str) -> (Column, usize) {
    let cells: Vec<Cell> = column
        .cells()
        .iter()
        .map(|c| coerce_cell(c, target, date_format))
        .collect();
    let before = column.non_null_count();
    let after = cells.iter().filter(|c| !c.is_null()).count();

    let column_type = if target == ColumnType::Unknown {
        ColumnType::from_cells(&cells)
    } else {
        target
    };

    (
        Column::with_type(column.name(), column_type, cells),
        before.saturating_sub(after),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn text_column(name: &str, values: &[Option<&str>]) -> Column {
        Column::new(
            name,
            values
                .iter()
                .map(|v| v.map_or(Cell::Null, Cell::from))
                .collect(),
        )
    }

    // ========================================================================
    // Inference
    // ========================================================================

    #[test]
    fn test_infer_numeric_from_text() {
        let col = text_column("price", &[Some("1.5"), Some(" 2 "), None, Some("-3")]);
        assert_eq!(TypeInferencer::default().infer(&col), ColumnType::Numeric);
    }

    #[test]
    fn test_infer_datetime_patterns() {
        let inferencer = TypeInferencer::default();
        for value in ["2024-01-15", "15/01/2024", "15-01-2024"] {
            let col = text_column("when", &[Some(value)]);
            assert_eq!(inferencer.infer(&col), ColumnType::DateTime, "{}", value);
        }
    }

    #[test]
    fn test_infer_text_and_unknown() {
        let inferencer = TypeInferencer::default();
        let col = text_column("name", &[Some("Alice"), Some("42")]);
        assert_eq!(inferencer.infer(&col), ColumnType::Text);

        let col = text_column("empty", &[None, None]);
        assert_eq!(inferencer.infer(&col), ColumnType::Unknown);
    }

    #[test]
    fn test_infer_keeps_typed_columns() {
        let col = Column::from_values("flag", vec![true, false]);
        assert_eq!(TypeInferencer::default().infer(&col), ColumnType::Boolean);
    }

    #[test]
    fn test_sample_size_limits_inspection() {
        let mut values: Vec<Option<&str>> = vec![Some("1"); 10];
        values.push(Some("not a number"));
        let col = text_column("mostly_numbers", &values);

        let inferencer = TypeInferencer::new(10, "%Y-%m-%d");
        assert_eq!(inferencer.infer(&col), ColumnType::Numeric);

        let wide = TypeInferencer::new(20, "%Y-%m-%d");
        assert_eq!(wide.infer(&col), ColumnType::Text);
    }

    // ========================================================================
    // Coercion
    // ========================================================================

    #[test]
    fn test_coercion_misses_become_null() {
        let mut values: Vec<Option<&str>> = vec![Some("1"); 10];
        values.push(Some("oops"));
        let table = Table::new(vec![text_column("n", &values)]).unwrap();

        let output = TypeInferencer::default().apply(&table);
        let col = output.table.column("n").unwrap();
        assert_eq!(col.column_type(), ColumnType::Numeric);
        assert_eq!(col.get(0), Some(&Cell::Number(1.0)));
        assert_eq!(col.get(10), Some(&Cell::Null));
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].values_affected, 1);
    }

    #[test]
    fn test_coerce_dates_with_preferred_format() {
        let cell = coerce_cell(&Cell::from("03/04/2024"), ColumnType::DateTime, "%m/%d/%Y");
        let expected = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(cell, Cell::DateTime(expected));
    }

    #[test]
    fn test_coerce_to_text_renders() {
        assert_eq!(
            coerce_cell(&Cell::Number(3.0), ColumnType::Text, "%Y-%m-%d"),
            Cell::from("3")
        );
        assert_eq!(
            coerce_cell(&Cell::Null, ColumnType::Text, "%Y-%m-%d"),
            Cell::Null
        );
    }

    #[test]
    fn test_apply_one_record_per_column() {
        let table = Table::new(vec![
            text_column("a", &[Some("1"), Some("2")]),
            text_column("b", &[Some("x"), None]),
        ])
        .unwrap();
        let output = TypeInferencer::default().apply(&table);
        assert_eq!(output.records.len(), 2);
        assert!(output.records.iter().all(|r| r.stage == "preprocess"));
        assert_eq!(output.table.column("b").unwrap().column_type(), ColumnType::Text);
    }
}
