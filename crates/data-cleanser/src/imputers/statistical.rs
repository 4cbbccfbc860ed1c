//! Statistical and positional imputation.
//!
//! Provides mean, median, mode, constant, forward/backward fill and linear
//! interpolation, plus row removal.

use crate::config::{DEFAULT_PLACEHOLDER, DateTimeFill, MissingStrategy, NumericFill, TextFill};
use crate::error::{CleaningError, Result};
use crate::table::{Cell, CellKey, Column, ColumnType, Table};
use crate::types::{ActionRecord, StageOutput};
use crate::utils::{mean, median};
use chrono::DateTime;
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub(crate) const STAGE: &str = "missing-data";

/// Outcome of resolving one column.
enum Resolution {
    /// Column cells replaced; count of values filled and description of the method.
    Filled(Vec<Cell>, usize, String),
    /// Rows with a null in the column must go.
    RemoveRows,
}

/// Fills or drops nulls column by column.
#[derive(Debug, Clone, Default)]
pub struct MissingDataResolver {
    strategy: MissingStrategy,
}

impl MissingDataResolver {
    pub fn new(strategy: MissingStrategy) -> Self {
        Self { strategy }
    }

    /// Resolve every column that holds at least one null.
    ///
    /// A failure on one column is recorded and leaves that column untouched;
    /// the remaining columns are still processed.
    pub fn apply(&self, table: &Table) -> StageOutput {
        let mut working = table.clone();
        let mut records = Vec::new();

        // Row removal keeps the column count, so indices stay valid
        for index in 0..table.width() {
            let Some(column) = working.columns().get(index) else {
                continue;
            };
            if column.null_count() == 0 {
                continue;
            }
            let name = column.name().to_string();

            match self.resolve_at(&working, index) {
                Ok((resolved, record)) => {
                    working = resolved;
                    records.push(record);
                }
                Err(e) => {
                    warn!("Imputation failed for '{}': {}", name, e);
                    records.push(ActionRecord::failure(STAGE, e.to_string()).for_column(&name));
                }
            }
        }

        if records.is_empty() {
            records.push(ActionRecord::success(STAGE, "no missing values found"));
        }
        info!(
            "Missing data resolved: {} nulls before, {} after",
            table.null_count(),
            working.null_count()
        );

        StageOutput {
            table: working,
            records,
            issues: Vec::new(),
        }
    }

    /// Resolve the nulls of a single column, returning the new table.
    pub fn resolve_column(&self, table: &Table, name: &str) -> Result<(Table, ActionRecord)> {
        let index = table
            .column_index(name)
            .ok_or_else(|| CleaningError::ColumnNotFound(name.to_string()))?;
        self.resolve_at(table, index)
    }

    fn resolve_at(&self, table: &Table, index: usize) -> Result<(Table, ActionRecord)> {
        let column = table
            .columns()
            .get(index)
            .ok_or_else(|| CleaningError::ColumnNotFound(format!("#{}", index)))?;
        let name = column.name();
        let nulls = column.null_count();

        match self.resolution_for(column)? {
            Resolution::RemoveRows => {
                let keep: Vec<bool> = column.cells().iter().map(|c| !c.is_null()).collect();
                debug!("Removing {} rows with null '{}'", nulls, name);
                let record = ActionRecord::success(
                    STAGE,
                    format!("removed {} rows with missing values", nulls),
                )
                .for_column(name)
                .with_rows(nulls);
                Ok((table.filter_rows(&keep), record))
            }
            Resolution::Filled(cells, filled, method) => {
                debug!("Filled {} values in '{}' with {}", filled, name, method);
                let mut output = table.clone();
                output.replace_column(index, column.clone().with_cells(cells))?;
                let record = ActionRecord::success(
                    STAGE,
                    format!("filled {} missing values with {}", filled, method),
                )
                .for_column(name)
                .with_values(filled);
                Ok((output, record))
            }
        }
    }

    fn resolution_for(&self, column: &Column) -> Result<Resolution> {
        match column.column_type() {
            ColumnType::Numeric => self.resolve_numeric(column),
            ColumnType::DateTime => self.resolve_datetime(column),
            ColumnType::Boolean => self.resolve_boolean(column),
            ColumnType::Text | ColumnType::Categorical | ColumnType::Unknown => {
                self.resolve_text(column)
            }
        }
    }

    fn resolve_numeric(&self, column: &Column) -> Result<Resolution> {
        let cells = column.cells();
        let values = column.numeric_values();
        let mut fill = self.strategy.numeric;

        if fill == NumericFill::Custom {
            if let Some(value) = self.strategy.custom_values.get(column.name()) {
                return Ok(filled_with(cells, Cell::Number(*value), format!("custom value {}", value)));
            }
            warn!(
                "No custom value supplied for '{}', falling back to mean",
                column.name()
            );
            fill = NumericFill::Mean;
        }

        if fill == NumericFill::RemoveRow {
            return Ok(Resolution::RemoveRows);
        }

        if values.is_empty() {
            warn!("Column '{}' has no values, filling with 0", column.name());
            return Ok(filled_with(cells, Cell::Number(0.0), "0 (no observed values)".to_string()));
        }

        let resolution = match fill {
            NumericFill::Mean | NumericFill::Custom => {
                let m = mean(&values).ok_or_else(|| no_values(column))?;
                filled_with(cells, Cell::Number(m), format!("mean ({:.4})", m))
            }
            NumericFill::Median => {
                let m = median(&values).ok_or_else(|| no_values(column))?;
                filled_with(cells, Cell::Number(m), format!("median ({:.4})", m))
            }
            NumericFill::Zero => filled_with(cells, Cell::Number(0.0), "0".to_string()),
            NumericFill::ForwardFill => positional(cells, forward_then_backward(cells), "forward fill"),
            NumericFill::BackwardFill => positional(cells, backward_then_forward(cells), "backward fill"),
            NumericFill::Interpolate => positional(cells, interpolate(cells), "linear interpolation"),
            NumericFill::RemoveRow => Resolution::RemoveRows,
        };
        Ok(resolution)
    }

    fn resolve_text(&self, column: &Column) -> Result<Resolution> {
        let cells = column.cells();
        let placeholder = || Cell::Text(DEFAULT_PLACEHOLDER.to_string());

        let resolution = match &self.strategy.text {
            TextFill::RemoveRow => Resolution::RemoveRows,
            TextFill::Placeholder(value) => {
                filled_with(cells, Cell::Text(value.clone()), format!("placeholder '{}'", value))
            }
            _ if column.non_null_count() == 0 => {
                warn!("Column '{}' has no values, using placeholder", column.name());
                filled_with(cells, placeholder(), format!("placeholder '{}'", DEFAULT_PLACEHOLDER))
            }
            TextFill::Mode => {
                let value = mode(cells).unwrap_or_else(placeholder);
                let label = format!("mode '{}'", value);
                filled_with(cells, value, label)
            }
            TextFill::ForwardFill => positional(cells, forward_then_backward(cells), "forward fill"),
            TextFill::BackwardFill => positional(cells, backward_then_forward(cells), "backward fill"),
        };
        Ok(resolution)
    }

    fn resolve_boolean(&self, column: &Column) -> Result<Resolution> {
        let cells = column.cells();
        let resolution = match &self.strategy.text {
            TextFill::RemoveRow => Resolution::RemoveRows,
            TextFill::ForwardFill => positional(cells, forward_then_backward(cells), "forward fill"),
            TextFill::BackwardFill => positional(cells, backward_then_forward(cells), "backward fill"),
            TextFill::Mode | TextFill::Placeholder(_) => {
                let value = mode(cells).ok_or_else(|| no_values(column))?;
                let label = format!("mode '{}'", value);
                filled_with(cells, value, label)
            }
        };
        Ok(resolution)
    }

    fn resolve_datetime(&self, column: &Column) -> Result<Resolution> {
        let cells = column.cells();
        match self.strategy.datetime {
            DateTimeFill::RemoveRow => Ok(Resolution::RemoveRows),
            DateTimeFill::Median => {
                let stamps: Vec<f64> = cells
                    .iter()
                    .filter_map(Cell::as_datetime)
                    .map(|dt| dt.and_utc().timestamp_millis() as f64)
                    .collect();
                let median_ts = median(&stamps).ok_or_else(|| CleaningError::ImputationFailed {
                    column: column.name().to_string(),
                    reason: "no timestamps to take a median from".to_string(),
                })?;
                let dt = DateTime::from_timestamp_millis(median_ts.round() as i64)
                    .map(|d| d.naive_utc())
                    .ok_or_else(|| CleaningError::ImputationFailed {
                        column: column.name().to_string(),
                        reason: format!("median timestamp {} out of range", median_ts),
                    })?;
                let label = format!("median timestamp ({})", dt);
                Ok(filled_with(cells, Cell::DateTime(dt), label))
            }
        }
    }
}

fn no_values(column: &Column) -> CleaningError {
    CleaningError::NoValidValues(column.name().to_string())
}

fn filled_with(cells: &[Cell], value: Cell, method: String) -> Resolution {
    let mut filled = 0;
    let out = cells
        .iter()
        .map(|c| {
            if c.is_null() {
                filled += 1;
                value.clone()
            } else {
                c.clone()
            }
        })
        .collect();
    Resolution::Filled(out, filled, method)
}

fn positional(before: &[Cell], after: Vec<Cell>, method: &str) -> Resolution {
    let filled = before
        .iter()
        .zip(&after)
        .filter(|(b, a)| b.is_null() && !a.is_null())
        .count();
    Resolution::Filled(after, filled, method.to_string())
}

/// Most frequent non-null value; ties go to the value seen first.
fn mode(cells: &[Cell]) -> Option<Cell> {
    let mut counts: HashMap<CellKey, (usize, usize)> = HashMap::new();
    for (i, cell) in cells.iter().enumerate().filter(|(_, c)| !c.is_null()) {
        counts.entry(cell.key()).or_insert((0, i)).0 += 1;
    }
    counts
        .into_values()
        .max_by(|(ca, ia), (cb, ib)| ca.cmp(cb).then(ib.cmp(ia)))
        .map(|(_, first_index)| cells[first_index].clone())
}

fn forward_fill(cells: &[Cell]) -> Vec<Cell> {
    let mut last: Option<&Cell> = None;
    cells
        .iter()
        .map(|c| {
            if c.is_null() {
                last.cloned().unwrap_or(Cell::Null)
            } else {
                last = Some(c);
                c.clone()
            }
        })
        .collect()
}

fn backward_fill(cells: &[Cell]) -> Vec<Cell> {
    let mut reversed: Vec<Cell> = cells.iter().rev().cloned().collect();
    reversed = forward_fill(&reversed);
    reversed.reverse();
    reversed
}

/// Forward fill, then backward fill whatever leads the column.
fn forward_then_backward(cells: &[Cell]) -> Vec<Cell> {
    backward_fill(&forward_fill(cells))
}

fn backward_then_forward(cells: &[Cell]) -> Vec<Cell> {
    forward_fill(&backward_fill(cells))
}

/// Linear interpolation by row position; leading and trailing gaps take the
/// nearest observed value.
fn interpolate(cells: &[Cell]) -> Vec<Cell> {
    let known: Vec<(usize, f64)> = cells
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.as_f64().map(|v| (i, v)))
        .collect();
    if known.is_empty() {
        return cells.to_vec();
    }

    cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            if !cell.is_null() {
                return cell.clone();
            }
            let next = known.partition_point(|(k, _)| *k < i);
            let value = match (next.checked_sub(1).map(|p| known[p]), known.get(next)) {
                (Some((i0, v0)), Some(&(i1, v1))) => {
                    v0 + (v1 - v0) * (i - i0) as f64 / (i1 - i0) as f64
                }
                (Some((_, v0)), None) => v0,
                (None, Some(&(_, v1))) => v1,
                (None, None) => return Cell::Null,
            };
            Cell::Number(value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn numeric(values: &[Option<f64>]) -> Table {
        Table::new(vec![Column::new(
            "value",
            values.iter().map(|v| Cell::from(*v)).collect(),
        )])
        .unwrap()
    }

    fn resolver(numeric: NumericFill) -> MissingDataResolver {
        MissingDataResolver::new(MissingStrategy {
            numeric,
            ..Default::default()
        })
    }

    fn values(table: &Table) -> Vec<Cell> {
        table.column("value").unwrap().cells().to_vec()
    }

    // ========================================================================
    // Numeric strategies
    // ========================================================================

    #[test]
    fn test_mean_fill() {
        let table = numeric(&[Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)]);
        let output = resolver(NumericFill::Mean).apply(&table);
        assert_eq!(values(&output.table)[2], Cell::Number(3.0));
        assert_eq!(output.table.null_count(), 0);
        assert_eq!(output.records[0].values_affected, 1);
    }

    #[test]
    fn test_median_and_zero_fill() {
        let table = numeric(&[Some(1.0), None, Some(10.0), Some(2.0)]);
        let output = resolver(NumericFill::Median).apply(&table);
        assert_eq!(values(&output.table)[1], Cell::Number(2.0));

        let output = resolver(NumericFill::Zero).apply(&table);
        assert_eq!(values(&output.table)[1], Cell::Number(0.0));
    }

    #[test]
    fn test_forward_and_backward_fill_cover_edges() {
        let table = numeric(&[None, Some(1.0), None, Some(3.0), None]);

        let output = resolver(NumericFill::ForwardFill).apply(&table);
        assert_eq!(
            values(&output.table),
            vec![
                Cell::Number(1.0),
                Cell::Number(1.0),
                Cell::Number(1.0),
                Cell::Number(3.0),
                Cell::Number(3.0)
            ]
        );

        let output = resolver(NumericFill::BackwardFill).apply(&table);
        assert_eq!(
            values(&output.table),
            vec![
                Cell::Number(1.0),
                Cell::Number(1.0),
                Cell::Number(3.0),
                Cell::Number(3.0),
                Cell::Number(3.0)
            ]
        );
    }

    #[test]
    fn test_interpolate() {
        let table = numeric(&[None, Some(1.0), None, None, Some(4.0), None]);
        let output = resolver(NumericFill::Interpolate).apply(&table);
        assert_eq!(
            values(&output.table),
            vec![
                Cell::Number(1.0),
                Cell::Number(1.0),
                Cell::Number(2.0),
                Cell::Number(3.0),
                Cell::Number(4.0),
                Cell::Number(4.0)
            ]
        );
    }

    #[test]
    fn test_remove_row() {
        let table = numeric(&[Some(1.0), None, Some(3.0)]);
        let output = resolver(NumericFill::RemoveRow).apply(&table);
        assert_eq!(output.table.height(), 2);
        assert_eq!(output.records[0].rows_affected, 1);
    }

    #[test]
    fn test_custom_value_and_fallback() {
        let strategy = MissingStrategy {
            numeric: NumericFill::Custom,
            custom_values: [("value".to_string(), 42.0)].into_iter().collect(),
            ..Default::default()
        };
        let table = numeric(&[Some(1.0), None]);
        let output = MissingDataResolver::new(strategy.clone()).apply(&table);
        assert_eq!(values(&output.table)[1], Cell::Number(42.0));

        let other = Table::new(vec![Column::new(
            "other",
            vec![Cell::from(2.0), Cell::Null, Cell::from(4.0)],
        )])
        .unwrap();
        let output = MissingDataResolver::new(strategy).apply(&other);
        assert_eq!(output.table.column("other").unwrap().get(1), Some(&Cell::Number(3.0)));
    }

    #[test]
    fn test_all_null_numeric_fills_zero() {
        let table = Table::new(vec![Column::with_type(
            "value",
            ColumnType::Numeric,
            vec![Cell::Null, Cell::Null],
        )])
        .unwrap();
        let output = resolver(NumericFill::Mean).apply(&table);
        assert_eq!(output.table.null_count(), 0);
    }

    // ========================================================================
    // Text, boolean and datetime strategies
    // ========================================================================

    #[test]
    fn test_text_mode_ties_first_seen() {
        let table = Table::new(vec![Column::new(
            "city",
            vec![
                Cell::from("Paris"),
                Cell::from("Rome"),
                Cell::Null,
                Cell::from("Rome"),
                Cell::from("Paris"),
            ],
        )])
        .unwrap();
        let output = MissingDataResolver::default().apply(&table);
        assert_eq!(output.table.column("city").unwrap().get(2), Some(&Cell::from("Paris")));
    }

    #[test]
    fn test_text_placeholder() {
        let strategy = MissingStrategy {
            text: TextFill::Placeholder("N/A".to_string()),
            ..Default::default()
        };
        let table = Table::new(vec![Column::new("city", vec![Cell::Null, Cell::from("x")])]).unwrap();
        let output = MissingDataResolver::new(strategy).apply(&table);
        assert_eq!(output.table.column("city").unwrap().get(0), Some(&Cell::from("N/A")));
    }

    #[test]
    fn test_unknown_column_gets_placeholder() {
        let table = Table::new(vec![Column::new("blank", vec![Cell::Null, Cell::Null])]).unwrap();
        let output = MissingDataResolver::default().apply(&table);
        assert_eq!(output.table.null_count(), 0);
        assert_eq!(output.table.column("blank").unwrap().get(0), Some(&Cell::from("Unknown")));
    }

    #[test]
    fn test_datetime_median() {
        let day = |d: u32| {
            Cell::from(
                NaiveDate::from_ymd_opt(2024, 1, d)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            )
        };
        let table = Table::new(vec![Column::new(
            "joined",
            vec![day(1), Cell::Null, day(3), day(5)],
        )])
        .unwrap();
        let output = MissingDataResolver::default().apply(&table);
        assert_eq!(output.table.column("joined").unwrap().get(1), Some(&day(3)));
    }

    #[test]
    fn test_failure_is_isolated_per_column() {
        let table = Table::new(vec![
            Column::with_type("when", ColumnType::DateTime, vec![Cell::Null, Cell::Null]),
            Column::new("n", vec![Cell::from(2.0), Cell::Null]),
        ])
        .unwrap();
        let output = MissingDataResolver::default().apply(&table);

        assert_eq!(output.records.len(), 2);
        assert!(!output.records[0].outcome.is_success());
        assert_eq!(output.records[0].column.as_deref(), Some("when"));
        assert!(output.records[1].outcome.is_success());
        assert_eq!(output.table.column("n").unwrap().get(1), Some(&Cell::Number(2.0)));
    }

    #[test]
    fn test_columns_sharing_a_name_are_filled_independently() {
        let table = Table::new(vec![
            Column::new("age", vec![Cell::from(1.0), Cell::from(2.0), Cell::from(3.0)]),
            Column::new("age", vec![Cell::from(10.0), Cell::Null, Cell::from(30.0)]),
        ])
        .unwrap();
        let output = MissingDataResolver::default().apply(&table);

        assert_eq!(output.table.null_count(), 0);
        assert_eq!(output.table.columns()[0].numeric_values(), vec![1.0, 2.0, 3.0]);
        assert_eq!(output.table.columns()[1].numeric_values(), vec![10.0, 20.0, 30.0]);
    }
}
