//! Conversion between [`Table`] and polars `DataFrame`.
//!
//! Loading and saving are collaborator concerns; this module is the single
//! place where the crate touches polars so the CLI and tests can read CSV
//! fixtures and write cleaned output.

use super::{Cell, Column, ColumnType, Table};
use crate::error::{Result, ResultExt};
use crate::utils::parse_datetime;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude as pl;
use polars::prelude::{SerReader, SerWriter};
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Check if a polars DataType is numeric (integer or float).
fn is_numeric_dtype(dtype: &pl::DataType) -> bool {
    matches!(
        dtype,
        pl::DataType::Int8
            | pl::DataType::Int16
            | pl::DataType::Int32
            | pl::DataType::Int64
            | pl::DataType::UInt8
            | pl::DataType::UInt16
            | pl::DataType::UInt32
            | pl::DataType::UInt64
            | pl::DataType::Float32
            | pl::DataType::Float64
    )
}

fn is_temporal_dtype(dtype: &pl::DataType) -> bool {
    matches!(dtype, pl::DataType::Datetime(_, _) | pl::DataType::Date)
}

fn series_to_cells(series: &pl::Series) -> Result<Vec<Cell>> {
    let dtype = series.dtype();

    if is_numeric_dtype(dtype) {
        let floats = series.cast(&pl::DataType::Float64)?;
        return Ok(floats.f64()?.into_iter().map(Cell::from).collect());
    }

    if matches!(dtype, pl::DataType::Boolean) {
        return Ok(series.bool()?.into_iter().map(Cell::from).collect());
    }

    let strings = series.cast(&pl::DataType::String)?;
    let values = strings.str()?;
    if is_temporal_dtype(dtype) {
        return Ok(values
            .into_iter()
            .map(|v| v.and_then(|s| parse_datetime(s, None)).map_or(Cell::Null, Cell::DateTime))
            .collect());
    }

    Ok(values
        .into_iter()
        .map(|v| v.map_or(Cell::Null, |s| Cell::Text(s.to_string())))
        .collect())
}

impl Table {
    /// Build a table from a polars `DataFrame`.
    ///
    /// String columns become `Text` cells; the type inferencer decides later
    /// whether they hold numbers or dates.
    pub fn from_dataframe(df: &pl::DataFrame) -> Result<Self> {
        let mut columns = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let cells = series_to_cells(series)
                .context(format!("Failed to read column '{}'", series.name()))?;
            columns.push(Column::new(series.name().to_string(), cells));
        }
        Table::new(columns)
    }

    /// Convert to a polars `DataFrame`, rendering timestamps with `date_format`.
    pub fn to_dataframe(&self, date_format: &str) -> Result<pl::DataFrame> {
        let columns: Vec<pl::Column> = self
            .columns()
            .iter()
            .map(|c| column_to_polars(c, date_format))
            .collect();
        pl::DataFrame::new(columns).context("Failed to assemble DataFrame")
    }
}

fn column_to_polars(column: &Column, date_format: &str) -> pl::Column {
    let name: pl::PlSmallStr = column.name().into();
    match column.column_type() {
        ColumnType::Numeric => {
            let values: Vec<Option<f64>> = column.cells().iter().map(Cell::as_f64).collect();
            pl::Column::new(name, values)
        }
        ColumnType::Boolean => {
            let values: Vec<Option<bool>> = column.cells().iter().map(Cell::as_bool).collect();
            pl::Column::new(name, values)
        }
        _ => {
            let values: Vec<Option<String>> = column
                .cells()
                .iter()
                .map(|c| c.render(date_format))
                .collect();
            pl::Column::new(name, values)
        }
    }
}

/// Load a CSV file with every column read as text.
pub fn read_csv(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .context(format!("Failed to read CSV '{}'", path.display()))?;
    debug!("Loaded CSV {} with shape {:?}", path.display(), df.shape());
    Table::from_dataframe(&df)
}

/// Write a table to CSV.
pub fn write_csv(table: &Table, path: impl AsRef<Path>, date_format: &str) -> Result<()> {
    let mut df = table.to_dataframe(date_format)?;
    let mut file = File::create(path.as_ref())?;
    pl::CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(&mut df)?;
    debug!("Wrote {} rows to {}", table.height(), path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dataframe_types() {
        let df = polars::df![
            "price" => [Some(1.5), None, Some(3.0)],
            "name" => ["a", "b", "c"],
            "flag" => [true, false, true],
        ]
        .unwrap();

        let table = Table::from_dataframe(&df).unwrap();
        assert_eq!(table.shape(), (3, 3));
        assert_eq!(table.column("price").unwrap().column_type(), ColumnType::Numeric);
        assert_eq!(table.column("price").unwrap().cells()[1], Cell::Null);
        assert_eq!(table.column("name").unwrap().column_type(), ColumnType::Text);
        assert_eq!(table.column("flag").unwrap().column_type(), ColumnType::Boolean);
    }

    #[test]
    fn test_roundtrip_through_dataframe() {
        let table = Table::new(vec![
            Column::from_values("amount", vec![Some(10.0), None]),
            Column::from_values("city", vec![Some("Bangkok"), None]),
        ])
        .unwrap();

        let df = table.to_dataframe("%Y-%m-%d").unwrap();
        assert_eq!(df.shape(), (2, 2));
        let back = Table::from_dataframe(&df).unwrap();
        assert_eq!(back, table);
    }
}
