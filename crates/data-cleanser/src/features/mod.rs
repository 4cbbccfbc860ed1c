//! Feature engineering.
//!
//! [`FeatureEngine`] derives new columns from existing ones and reshapes
//! values. Operations are described by [`FeatureOp`] and run in order by
//! [`FeatureEngine::transform`]; each one is isolated, so a failing operation
//! is logged and the next one sees the table as it was before it.
//!
//! # Example
//!
//! ```rust,ignore
//! use data_cleanser::features::{FeatureEngine, FeatureFn, FeatureOp, NormalizeMethod};
//!
//! let ops = vec![
//!     FeatureOp::Normalize { column: "income".into(), method: NormalizeMethod::MinMax },
//!     FeatureOp::Create {
//!         name: "income_per_member".into(),
//!         inputs: vec!["income".into(), "household_size".into()],
//!         func: FeatureFn::new(|row| match (row[0].as_f64(), row[1].as_f64()) {
//!             (Some(i), Some(n)) if n > 0.0 => Ok((i / n).into()),
//!             _ => Ok(Cell::Null),
//!         }),
//!     },
//! ];
//! let output = FeatureEngine::new().transform(&table, &ops)?;
//! ```
//!
//! [`FeatureEngine::auto_transform`] chooses operations itself from column
//! names and types; see the `auto` module for the rules.

mod auto;
mod derive;
mod scaling;

pub use derive::{date_parts, email_domain, row_aggregates, text_stats};
pub use scaling::{BinMethod, EncodeMethod, NormalizeMethod, bin, encode, normalize};

use crate::config::DEFAULT_DATE_FORMAT;
use crate::error::{CleaningError, Result};
use crate::profiler::coerce_column;
use crate::table::{Cell, CellKey, Column, ColumnType, Table};
use crate::types::{ActionRecord, TransformOutput, TransformationLog};
use chrono::{Local, NaiveDate};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

type RowFn = dyn Fn(&[Cell]) -> std::result::Result<Cell, String> + Send + Sync;

/// A user-supplied row function for [`FeatureOp::Create`].
///
/// Receives the row's values for the input columns, in the order given.
#[derive(Clone)]
pub struct FeatureFn(Arc<RowFn>);

impl FeatureFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Cell]) -> std::result::Result<Cell, String> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    fn call(&self, row: &[Cell]) -> std::result::Result<Cell, String> {
        (self.0)(row)
    }
}

impl fmt::Debug for FeatureFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FeatureFn(..)")
    }
}

/// One feature engineering operation.
#[derive(Debug, Clone)]
pub enum FeatureOp {
    /// Append `name`, computed row by row from `inputs`.
    Create {
        name: String,
        inputs: Vec<String>,
        func: FeatureFn,
    },
    /// Substitute values; unmapped values pass through.
    MapValues {
        column: String,
        mapping: Vec<(Cell, Cell)>,
    },
    /// Concatenate the text of several columns into `new_name`.
    MergeColumns {
        columns: Vec<String>,
        new_name: String,
        separator: String,
    },
    /// Split a column on `separator` into one column per entry of `new_names`.
    SplitColumn {
        column: String,
        separator: String,
        new_names: Vec<String>,
    },
    /// Best-effort coercion, in the given order.
    ConvertTypes { mapping: Vec<(String, ColumnType)> },
    Normalize {
        column: String,
        method: NormalizeMethod,
    },
    Bin {
        column: String,
        bins: usize,
        method: BinMethod,
        labels: Option<Vec<String>>,
    },
    Encode {
        column: String,
        method: EncodeMethod,
    },
    DateParts { column: String },
    TextStats { column: String },
    RowAggregates { columns: Vec<String> },
    EmailDomain { column: String },
}

impl FeatureOp {
    /// Name used in the transformation log.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create-feature",
            Self::MapValues { .. } => "map-values",
            Self::MergeColumns { .. } => "merge-columns",
            Self::SplitColumn { .. } => "split-column",
            Self::ConvertTypes { .. } => "convert-types",
            Self::Normalize { .. } => "normalize",
            Self::Bin { .. } => "bin",
            Self::Encode { .. } => "encode",
            Self::DateParts { .. } => "date-parts",
            Self::TextStats { .. } => "text-stats",
            Self::RowAggregates { .. } => "row-aggregates",
            Self::EmailDomain { .. } => "email-domain",
        }
    }

    /// Column the operation centres on, if any.
    fn target(&self) -> Option<&str> {
        match self {
            Self::Create { name, .. } => Some(name.as_str()),
            Self::MergeColumns { new_name, .. } => Some(new_name.as_str()),
            Self::MapValues { column, .. }
            | Self::SplitColumn { column, .. }
            | Self::Normalize { column, .. }
            | Self::Bin { column, .. }
            | Self::Encode { column, .. }
            | Self::DateParts { column }
            | Self::TextStats { column }
            | Self::EmailDomain { column } => Some(column.as_str()),
            Self::ConvertTypes { .. } | Self::RowAggregates { .. } => None,
        }
    }

    /// Check for caller mistakes that make the operation meaningless.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(CleaningError::InvalidConfig(msg));
        match self {
            Self::Create { name, inputs, .. } => {
                if name.trim().is_empty() {
                    return invalid("feature name must not be empty".to_string());
                }
                if inputs.is_empty() {
                    return invalid(format!("feature '{}' has no input columns", name));
                }
            }
            Self::MergeColumns { columns, new_name, .. } => {
                if columns.is_empty() || new_name.trim().is_empty() {
                    return invalid("merge needs source columns and a new name".to_string());
                }
            }
            Self::SplitColumn {
                separator,
                new_names,
                ..
            } => {
                if separator.is_empty() {
                    return invalid("split separator must not be empty".to_string());
                }
                if new_names.is_empty() {
                    return invalid("split needs at least one new column name".to_string());
                }
            }
            Self::Bin { bins, labels, .. } => {
                if *bins == 0 {
                    return invalid("bin count must be at least 1".to_string());
                }
                if let Some(labels) = labels
                    && labels.len() != *bins
                {
                    return invalid(format!("{} labels given for {} bins", labels.len(), bins));
                }
            }
            Self::RowAggregates { columns } if columns.is_empty() => {
                return invalid("row aggregates need at least one column".to_string());
            }
            _ => {}
        }
        Ok(())
    }
}

/// Derives and reshapes columns.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    date_format: String,
    today: Option<NaiveDate>,
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureEngine {
    pub fn new() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            today: None,
        }
    }

    /// Format used when timestamps are rendered as text.
    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = date_format.into();
        self
    }

    /// Pin the date that `days_from_today` is measured against.
    pub fn with_reference_date(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Run `ops` in order.
    ///
    /// Every operation is validated before anything runs; an invalid one is
    /// returned as an error. After that, failures are recorded in the log and
    /// never abort the remaining operations.
    pub fn transform(&self, table: &Table, ops: &[FeatureOp]) -> Result<TransformOutput> {
        for op in ops {
            op.validate()?;
        }

        info!("Applying {} feature operations", ops.len());
        let mut log = TransformationLog::new();
        let mut current = table.clone();

        for op in ops {
            let before = current.width();
            match self.apply(&current, op) {
                Ok(next) => {
                    let added = next.width().saturating_sub(before);
                    let mut record =
                        ActionRecord::success(op.name(), describe(op, added)).with_values(added);
                    if let Some(target) = op.target() {
                        record = record.for_column(target);
                    }
                    debug!("{}", record);
                    log.push(record);
                    current = next;
                }
                Err(e) => {
                    warn!("Feature operation '{}' failed: {}", op.name(), e);
                    let mut record = ActionRecord::failure(op.name(), e.to_string());
                    if let Some(target) = op.target() {
                        record = record.for_column(target);
                    }
                    log.push(record);
                }
            }
        }

        Ok(TransformOutput {
            table: current,
            log,
        })
    }

    /// Apply a single operation, returning the new table.
    pub fn apply(&self, table: &Table, op: &FeatureOp) -> Result<Table> {
        match op {
            FeatureOp::Create { name, inputs, func } => self.create_feature(table, name, func, inputs),
            FeatureOp::MapValues { column, mapping } => self.map_values(table, column, mapping),
            FeatureOp::MergeColumns {
                columns,
                new_name,
                separator,
            } => self.merge_columns(table, columns, new_name, separator),
            FeatureOp::SplitColumn {
                column,
                separator,
                new_names,
            } => self.split_column(table, column, separator, new_names),
            FeatureOp::ConvertTypes { mapping } => self.convert_types(table, mapping),
            FeatureOp::Normalize { column, method } => {
                let normalized = normalize(table.require_column(column)?, *method)?;
                with_columns(table, vec![normalized])
            }
            FeatureOp::Bin {
                column,
                bins,
                method,
                labels,
            } => {
                let binned = bin(table.require_column(column)?, *bins, *method, labels.as_deref())?;
                with_columns(table, vec![binned])
            }
            FeatureOp::Encode { column, method } => {
                with_columns(table, encode(table.require_column(column)?, *method)?)
            }
            FeatureOp::DateParts { column } => {
                with_columns(table, date_parts(table.require_column(column)?, self.today())?)
            }
            FeatureOp::TextStats { column } => {
                with_columns(table, text_stats(table.require_column(column)?)?)
            }
            FeatureOp::RowAggregates { columns } => {
                with_columns(table, row_aggregates(table, columns)?)
            }
            FeatureOp::EmailDomain { column } => {
                with_columns(table, vec![email_domain(table.require_column(column)?)?])
            }
        }
    }

    /// Append a column computed by `func` from the row values of `inputs`.
    pub fn create_feature(
        &self,
        table: &Table,
        name: &str,
        func: &FeatureFn,
        inputs: &[String],
    ) -> Result<Table> {
        let sources = inputs
            .iter()
            .map(|input| table.require_column(input))
            .collect::<Result<Vec<&Column>>>()?;

        let mut cells = Vec::with_capacity(table.height());
        let mut row = Vec::with_capacity(sources.len());
        for i in 0..table.height() {
            row.clear();
            row.extend(sources.iter().map(|c| c.get(i).cloned().unwrap_or_default()));
            let value = func.call(&row).map_err(|reason| CleaningError::StageFailed {
                stage: format!("create-feature '{}' at row {}", name, i),
                reason,
            })?;
            cells.push(value);
        }

        with_columns(table, vec![Column::new(name, cells)])
    }

    /// Replace values found in `mapping`. The column type is re-derived.
    pub fn map_values(&self, table: &Table, column: &str, mapping: &[(Cell, Cell)]) -> Result<Table> {
        let source = table.require_column(column)?;
        let lookup: HashMap<CellKey, &Cell> = mapping.iter().map(|(from, to)| (from.key(), to)).collect();

        let cells: Vec<Cell> = source
            .cells()
            .iter()
            .map(|c| lookup.get(&c.key()).map_or_else(|| c.clone(), |to| (*to).clone()))
            .collect();

        with_columns(table, vec![Column::new(column, cells)])
    }

    /// Join the rendered values of `columns` with `separator`, skipping nulls.
    pub fn merge_columns(
        &self,
        table: &Table,
        columns: &[String],
        new_name: &str,
        separator: &str,
    ) -> Result<Table> {
        let sources = columns
            .iter()
            .map(|name| table.require_column(name))
            .collect::<Result<Vec<&Column>>>()?;

        let cells = (0..table.height())
            .map(|i| {
                let parts: Vec<String> = sources
                    .iter()
                    .filter_map(|c| c.get(i).and_then(|cell| cell.render(&self.date_format)))
                    .collect();
                if parts.is_empty() {
                    Cell::Null
                } else {
                    Cell::Text(parts.join(separator))
                }
            })
            .collect();

        with_columns(
            table,
            vec![Column::with_type(new_name, ColumnType::Text, cells)],
        )
    }

    /// Split on `separator`; part `i` goes to `new_names[i]`. Extra parts are
    /// dropped and missing ones are null.
    pub fn split_column(
        &self,
        table: &Table,
        column: &str,
        separator: &str,
        new_names: &[String],
    ) -> Result<Table> {
        let source = table.require_column(column)?;
        let mut outputs: Vec<Vec<Cell>> = vec![Vec::with_capacity(table.height()); new_names.len()];

        for cell in source.cells() {
            let text = cell.render(&self.date_format);
            let mut parts = text.as_deref().map(|s| s.split(separator));
            for output in outputs.iter_mut() {
                let part = parts.as_mut().and_then(Iterator::next);
                output.push(part.map_or(Cell::Null, Cell::from));
            }
        }

        let columns = new_names
            .iter()
            .zip(outputs)
            .map(|(name, cells)| Column::with_type(name, ColumnType::Text, cells))
            .collect();
        with_columns(table, columns)
    }

    /// Coerce columns to the requested types; misses become null.
    pub fn convert_types(&self, table: &Table, mapping: &[(String, ColumnType)]) -> Result<Table> {
        let mut output = table.clone();
        for (name, target) in mapping {
            let source = output.require_column(name)?;
            let (converted, lost) = coerce_column(source, *target, &self.date_format);
            if lost > 0 {
                warn!("{} values in '{}' could not be converted to {}", lost, name, target);
            }
            output.put_column(converted)?;
        }
        Ok(output)
    }
}

/// Add or replace columns on a copy of `table`.
fn with_columns(table: &Table, columns: Vec<Column>) -> Result<Table> {
    let mut output = table.clone();
    for column in columns {
        output.put_column(column)?;
    }
    Ok(output)
}

fn describe(op: &FeatureOp, added: usize) -> String {
    match op {
        FeatureOp::Create { name, inputs, .. } => {
            format!("created '{}' from {}", name, inputs.join(", "))
        }
        FeatureOp::MapValues { mapping, .. } => format!("applied {} value mappings", mapping.len()),
        FeatureOp::MergeColumns { columns, new_name, .. } => {
            format!("merged {} into '{}'", columns.join(", "), new_name)
        }
        FeatureOp::SplitColumn { new_names, .. } => {
            format!("split into {}", new_names.join(", "))
        }
        FeatureOp::ConvertTypes { mapping } => format!("converted {} columns", mapping.len()),
        FeatureOp::Normalize { method, .. } => format!("normalized with {:?}", method),
        FeatureOp::Bin { bins, method, .. } => format!("binned into {} {:?} bins", bins, method),
        FeatureOp::Encode { method, .. } => format!("encoded with {:?}, {} new columns", method, added),
        FeatureOp::RowAggregates { columns } => {
            format!("aggregated {} columns per row", columns.len())
        }
        FeatureOp::DateParts { .. } | FeatureOp::TextStats { .. } | FeatureOp::EmailDomain { .. } => {
            format!("derived {} columns", added)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn people() -> Table {
        Table::new(vec![
            Column::from_values("first", vec!["Ann", "Bob", "Cy"]),
            Column::new("last", vec![Cell::from("Lee"), Cell::Null, Cell::from("Ng")]),
            Column::from_values("score", vec![1.0, 2.0, 3.0]),
            Column::from_values("grade", vec!["a", "b", "a"]),
        ])
        .unwrap()
    }

    fn engine() -> FeatureEngine {
        FeatureEngine::new().with_reference_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    }

    fn texts(table: &Table, name: &str) -> Vec<String> {
        table
            .column(name)
            .unwrap()
            .cells()
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    // ========================================================================
    // Individual operations
    // ========================================================================

    #[test]
    fn test_create_feature() {
        let double = FeatureFn::new(|row| Ok(Cell::from(row[0].as_f64().unwrap_or(0.0) * 2.0)));
        let table = engine()
            .create_feature(&people(), "double", &double, &["score".to_string()])
            .unwrap();
        assert_eq!(table.column("double").unwrap().numeric_values(), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_map_values_passes_unmapped() {
        let mapping = vec![(Cell::from("a"), Cell::from("excellent"))];
        let table = engine().map_values(&people(), "grade", &mapping).unwrap();
        assert_eq!(texts(&table, "grade"), vec!["excellent", "b", "excellent"]);
    }

    #[test]
    fn test_map_values_rederives_type() {
        let mapping = vec![
            (Cell::from("a"), Cell::from(1.0)),
            (Cell::from("b"), Cell::from(2.0)),
        ];
        let table = engine().map_values(&people(), "grade", &mapping).unwrap();
        assert_eq!(table.column("grade").unwrap().column_type(), ColumnType::Numeric);
    }

    #[test]
    fn test_merge_and_split() {
        let names = ["first".to_string(), "last".to_string()];
        let merged = engine().merge_columns(&people(), &names, "full", " ").unwrap();
        assert_eq!(texts(&merged, "full"), vec!["Ann Lee", "Bob", "Cy Ng"]);

        let split_names = ["given".to_string(), "family".to_string()];
        let split = engine().split_column(&merged, "full", " ", &split_names).unwrap();
        assert_eq!(split.column("given").unwrap().get(1), Some(&Cell::from("Bob")));
        assert_eq!(split.column("family").unwrap().get(1), Some(&Cell::Null));
        assert!(split.column("full").is_some());
    }

    #[test]
    fn test_split_drops_extra_parts() {
        let table = Table::new(vec![Column::from_values("code", vec!["a-b-c"])]).unwrap();
        let out = engine()
            .split_column(&table, "code", "-", &["x".to_string(), "y".to_string()])
            .unwrap();
        assert_eq!(out.width(), 3);
        assert_eq!(out.column("y").unwrap().get(0), Some(&Cell::from("b")));
    }

    #[test]
    fn test_convert_types() {
        let table = Table::new(vec![Column::from_values("n", vec!["1", "x"])]).unwrap();
        let out = engine()
            .convert_types(&table, &[("n".to_string(), ColumnType::Numeric)])
            .unwrap();
        let column = out.column("n").unwrap();
        assert_eq!(column.column_type(), ColumnType::Numeric);
        assert_eq!(column.cells(), &[Cell::Number(1.0), Cell::Null]);
    }

    // ========================================================================
    // Transform loop
    // ========================================================================

    #[test]
    fn test_transform_isolates_failures() {
        let ops = vec![
            FeatureOp::Normalize {
                column: "missing".to_string(),
                method: NormalizeMethod::MinMax,
            },
            FeatureOp::Encode {
                column: "grade".to_string(),
                method: EncodeMethod::OneHot,
            },
        ];
        let output = engine().transform(&people(), &ops).unwrap();

        assert_eq!(output.log.len(), 2);
        assert!(!output.log.records()[0].outcome.is_success());
        assert!(output.log.records()[1].outcome.is_success());
        assert_eq!(output.log.records()[1].values_affected, 2);
        assert!(output.table.column("grade_a").is_some());
    }

    #[test]
    fn test_transform_failing_feature_function() {
        let ops = vec![
            FeatureOp::Create {
                name: "boom".to_string(),
                inputs: vec!["score".to_string()],
                func: FeatureFn::new(|_| Err("division by zero".to_string())),
            },
            FeatureOp::TextStats {
                column: "first".to_string(),
            },
        ];
        let output = engine().transform(&people(), &ops).unwrap();
        assert!(output.table.column("boom").is_none());
        assert!(output.table.column("first_length").is_some());
        assert!(output.log.records()[0].summary.contains("division by zero"));
    }

    #[test]
    fn test_transform_rejects_invalid_ops_up_front() {
        let ops = vec![
            FeatureOp::TextStats {
                column: "first".to_string(),
            },
            FeatureOp::Bin {
                column: "score".to_string(),
                bins: 2,
                method: BinMethod::EqualWidth,
                labels: Some(vec!["only-one".to_string()]),
            },
        ];
        let err = engine().transform(&people(), &ops).unwrap_err();
        assert!(err.is_caller_error());
    }

    #[test]
    fn test_label_encoding_replaces_column() {
        let ops = vec![FeatureOp::Encode {
            column: "grade".to_string(),
            method: EncodeMethod::Label,
        }];
        let output = engine().transform(&people(), &ops).unwrap();
        assert_eq!(output.table.width(), 4);
        assert_eq!(
            output.table.column("grade").unwrap().numeric_values(),
            vec![0.0, 1.0, 0.0]
        );
    }

    #[test]
    fn test_label_encoding_all_null_column_is_logged_as_failure() {
        let table = Table::new(vec![
            Column::from_values("id", vec![1.0, 2.0]),
            Column::new("grade", vec![Cell::Null, Cell::Null]),
        ])
        .unwrap();
        assert_eq!(table.column("grade").unwrap().column_type(), ColumnType::Unknown);

        let ops = vec![FeatureOp::Encode {
            column: "grade".to_string(),
            method: EncodeMethod::Label,
        }];
        let output = engine().transform(&table, &ops).unwrap();

        assert_eq!(output.table, table);
        let failures: Vec<_> = output.log.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, "encode");
        assert_eq!(failures[0].column.as_deref(), Some("grade"));
    }
}
