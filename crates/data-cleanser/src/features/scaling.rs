//! Normalization, binning and categorical encoding.

use crate::error::{CleaningError, Result};
use crate::table::{Cell, CellKey, Column, ColumnType};
use crate::utils::{mean, quantile_sorted, sample_std, sorted};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMethod {
    /// `(x - min) / (max - min)`
    MinMax,
    /// `(x - mean) / std`
    ZScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinMethod {
    /// Equal-size intervals over the observed range
    EqualWidth,
    /// Intervals holding roughly equal row counts
    Quantile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeMethod {
    /// One boolean column per category
    OneHot,
    /// Dense integer code per category, in first-seen order
    Label,
}

impl FromStr for NormalizeMethod {
    type Err = CleaningError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "minmax" => Ok(Self::MinMax),
            "zscore" => Ok(Self::ZScore),
            other => Err(CleaningError::InvalidConfig(format!(
                "unsupported normalization method '{}'",
                other
            ))),
        }
    }
}

impl FromStr for BinMethod {
    type Err = CleaningError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "equalwidth" | "width" => Ok(Self::EqualWidth),
            "quantile" => Ok(Self::Quantile),
            other => Err(CleaningError::InvalidConfig(format!(
                "unsupported binning method '{}'",
                other
            ))),
        }
    }
}

impl FromStr for EncodeMethod {
    type Err = CleaningError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "onehot" => Ok(Self::OneHot),
            "label" => Ok(Self::Label),
            other => Err(CleaningError::InvalidConfig(format!(
                "unsupported encoding method '{}'",
                other
            ))),
        }
    }
}

fn require_numeric(column: &Column) -> Result<Vec<f64>> {
    if column.column_type() != ColumnType::Numeric {
        return Err(CleaningError::TypeConversionFailed {
            column: column.name().to_string(),
            target_type: ColumnType::Numeric.to_string(),
            reason: format!("column is {}", column.column_type()),
        });
    }
    let values = column.numeric_values();
    if values.is_empty() {
        return Err(CleaningError::NoValidValues(column.name().to_string()));
    }
    Ok(values)
}

/// Rescale a numeric column. Degenerate ranges map every value to 0.
pub fn normalize(column: &Column, method: NormalizeMethod) -> Result<Column> {
    let values = require_numeric(column)?;

    let scale: Box<dyn Fn(f64) -> f64> = match method {
        NormalizeMethod::MinMax => {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;
            if range == 0.0 {
                Box::new(|_| 0.0)
            } else {
                Box::new(move |v| (v - min) / range)
            }
        }
        NormalizeMethod::ZScore => {
            let m = mean(&values).unwrap_or(0.0);
            match sample_std(&values) {
                Some(std) if std > 0.0 => Box::new(move |v| (v - m) / std),
                _ => Box::new(|_| 0.0),
            }
        }
    };

    let cells = column
        .cells()
        .iter()
        .map(|c| c.as_f64().map_or(Cell::Null, |v| Cell::Number(scale(v))))
        .collect();
    Ok(column.clone().with_cells(cells))
}

/// Bucket a numeric column into `<column>_bin`.
pub fn bin(
    column: &Column,
    bins: usize,
    method: BinMethod,
    labels: Option<&[String]>,
) -> Result<Column> {
    if bins == 0 {
        return Err(CleaningError::InvalidConfig("bin count must be at least 1".to_string()));
    }
    if let Some(labels) = labels
        && labels.len() != bins
    {
        return Err(CleaningError::InvalidConfig(format!(
            "{} labels given for {} bins",
            labels.len(),
            bins
        )));
    }

    let values = require_numeric(column)?;
    let sorted_values = sorted(&values);
    let min = sorted_values[0];
    let max = sorted_values[sorted_values.len() - 1];

    // Upper edge of each bin
    let upper_edges: Vec<f64> = match method {
        BinMethod::EqualWidth => {
            let width = (max - min) / bins as f64;
            (1..=bins).map(|k| min + width * k as f64).collect()
        }
        BinMethod::Quantile => (1..=bins)
            .map(|k| quantile_sorted(&sorted_values, k as f64 / bins as f64).unwrap_or(max))
            .collect(),
    };

    let label_for = |index: usize| -> String {
        match labels {
            Some(labels) => labels[index].clone(),
            None => format!("bin_{}", index),
        }
    };

    let cells = column
        .cells()
        .iter()
        .map(|c| match c.as_f64() {
            Some(v) => {
                let index = upper_edges
                    .iter()
                    .position(|edge| v <= *edge)
                    .unwrap_or(bins - 1);
                Cell::Text(label_for(index))
            }
            None => Cell::Null,
        })
        .collect();

    Ok(Column::with_type(
        format!("{}_bin", column.name()),
        ColumnType::Categorical,
        cells,
    ))
}

/// Distinct non-null categories in first-seen order.
fn categories(column: &Column) -> Vec<(CellKey, String)> {
    let mut seen = HashMap::new();
    let mut ordered = Vec::new();
    for cell in column.cells().iter().filter(|c| !c.is_null()) {
        let key = cell.key();
        if !seen.contains_key(&key) {
            seen.insert(key.clone(), ordered.len());
            ordered.push((key, cell.to_string()));
        }
    }
    ordered
}

/// Encode a categorical column.
///
/// One-hot returns the new indicator columns; label returns the column itself
/// with codes in place of categories.
pub fn encode(column: &Column, method: EncodeMethod) -> Result<Vec<Column>> {
    let categories = categories(column);
    if categories.is_empty() {
        return Err(CleaningError::NoValidValues(column.name().to_string()));
    }

    match method {
        EncodeMethod::OneHot => Ok(categories
            .iter()
            .map(|(key, label)| {
                let cells = column
                    .cells()
                    .iter()
                    .map(|c| Cell::Boolean(!c.is_null() && &c.key() == key))
                    .collect();
                Column::with_type(
                    format!("{}_{}", column.name(), label),
                    ColumnType::Boolean,
                    cells,
                )
            })
            .collect()),
        EncodeMethod::Label => {
            let codes: HashMap<&CellKey, usize> = categories
                .iter()
                .enumerate()
                .map(|(code, (key, _))| (key, code))
                .collect();
            let cells = column
                .cells()
                .iter()
                .map(|c| {
                    if c.is_null() {
                        Cell::Null
                    } else {
                        codes
                            .get(&c.key())
                            .map_or(Cell::Null, |code| Cell::Number(*code as f64))
                    }
                })
                .collect();
            Ok(vec![Column::with_type(column.name(), ColumnType::Numeric, cells)])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numbers(values: &[Option<f64>]) -> Column {
        Column::new("x", values.iter().map(|v| Cell::from(*v)).collect())
    }

    fn labels(column: &Column) -> Vec<String> {
        column.cells().iter().map(|c| c.to_string()).collect()
    }

    // ========================================================================
    // Normalization
    // ========================================================================

    #[test]
    fn test_minmax() {
        let col = normalize(&numbers(&[Some(0.0), Some(5.0), Some(10.0), None]), NormalizeMethod::MinMax)
            .unwrap();
        assert_eq!(
            col.cells(),
            &[Cell::Number(0.0), Cell::Number(0.5), Cell::Number(1.0), Cell::Null]
        );
    }

    #[test]
    fn test_degenerate_ranges_map_to_zero() {
        let flat = numbers(&[Some(3.0), Some(3.0)]);
        for method in [NormalizeMethod::MinMax, NormalizeMethod::ZScore] {
            let col = normalize(&flat, method).unwrap();
            assert_eq!(col.numeric_values(), vec![0.0, 0.0]);
        }
    }

    #[test]
    fn test_zscore() {
        let col = normalize(&numbers(&[Some(1.0), Some(2.0), Some(3.0)]), NormalizeMethod::ZScore)
            .unwrap();
        assert_eq!(col.numeric_values(), vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_normalize_rejects_text() {
        let col = Column::from_values("name", vec!["a"]);
        assert!(matches!(
            normalize(&col, NormalizeMethod::MinMax),
            Err(CleaningError::TypeConversionFailed { .. })
        ));
    }

    // ========================================================================
    // Binning
    // ========================================================================

    #[test]
    fn test_equal_width_bins() {
        let col = numbers(&[Some(0.0), Some(2.0), Some(5.0), Some(7.5), Some(10.0), None]);
        let binned = bin(&col, 2, BinMethod::EqualWidth, None).unwrap();
        assert_eq!(binned.name(), "x_bin");
        assert_eq!(binned.column_type(), ColumnType::Categorical);
        assert_eq!(labels(&binned), vec!["bin_0", "bin_0", "bin_0", "bin_1", "bin_1", ""]);
    }

    #[test]
    fn test_quantile_bins_with_labels() {
        let col = numbers(&[Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
        let names = vec!["low".to_string(), "high".to_string()];
        let binned = bin(&col, 2, BinMethod::Quantile, Some(names.as_slice())).unwrap();
        assert_eq!(labels(&binned), vec!["low", "low", "high", "high"]);
    }

    #[test]
    fn test_bin_label_count_mismatch() {
        let col = numbers(&[Some(1.0)]);
        let names = vec!["only".to_string()];
        let err = bin(&col, 3, BinMethod::EqualWidth, Some(names.as_slice())).unwrap_err();
        assert!(err.is_caller_error());
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    #[test]
    fn test_one_hot() {
        let col = Column::new("color", vec![Cell::from("red"), Cell::Null, Cell::from("blue")]);
        let encoded = encode(&col, EncodeMethod::OneHot).unwrap();
        let names: Vec<&str> = encoded.iter().map(Column::name).collect();
        assert_eq!(names, vec!["color_red", "color_blue"]);
        assert_eq!(
            encoded[0].cells(),
            &[Cell::Boolean(true), Cell::Boolean(false), Cell::Boolean(false)]
        );
    }

    #[test]
    fn test_label_codes_follow_first_seen_order() {
        let col = Column::from_values("size", vec!["m", "s", "m", "l"]);
        let encoded = encode(&col, EncodeMethod::Label).unwrap();
        assert_eq!(encoded[0].numeric_values(), vec![0.0, 1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("one-hot".parse::<EncodeMethod>().unwrap(), EncodeMethod::OneHot);
        assert_eq!("equal_width".parse::<BinMethod>().unwrap(), BinMethod::EqualWidth);
        assert_eq!("minmax".parse::<NormalizeMethod>().unwrap(), NormalizeMethod::MinMax);
        assert!("ordinal".parse::<EncodeMethod>().unwrap_err().is_caller_error());
    }
}
