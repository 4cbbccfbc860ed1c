//! Automatic feature derivations: date parts, text statistics, row
//! aggregates and email domains.

use crate::error::{CleaningError, Result};
use crate::table::{Cell, Column, ColumnType, Table};
use chrono::{Datelike, NaiveDate, Weekday};

fn require_type(column: &Column, expected: ColumnType) -> Result<()> {
    if column.column_type() == expected {
        Ok(())
    } else {
        Err(CleaningError::TypeConversionFailed {
            column: column.name().to_string(),
            target_type: expected.to_string(),
            reason: format!("column is {}", column.column_type()),
        })
    }
}

/// Name stem for date part columns: `signup_date` becomes `signup`.
fn date_base(name: &str) -> &str {
    name.strip_suffix("_date")
        .or_else(|| name.strip_suffix("_time"))
        .unwrap_or(name)
}

/// Year, month, day, weekday (Monday = 0), quarter, weekend flag and age in
/// days relative to `today`.
pub fn date_parts(column: &Column, today: NaiveDate) -> Result<Vec<Column>> {
    require_type(column, ColumnType::DateTime)?;
    let base = date_base(column.name());

    let part = |suffix: &str, column_type: ColumnType, f: &dyn Fn(chrono::NaiveDateTime) -> Cell| {
        let cells = column
            .cells()
            .iter()
            .map(|c| c.as_datetime().map_or(Cell::Null, f))
            .collect();
        Column::with_type(format!("{}_{}", base, suffix), column_type, cells)
    };

    Ok(vec![
        part("year", ColumnType::Numeric, &|dt| Cell::Number(dt.year() as f64)),
        part("month", ColumnType::Numeric, &|dt| Cell::Number(dt.month() as f64)),
        part("day", ColumnType::Numeric, &|dt| Cell::Number(dt.day() as f64)),
        part("weekday", ColumnType::Numeric, &|dt| {
            Cell::Number(dt.weekday().num_days_from_monday() as f64)
        }),
        part("quarter", ColumnType::Numeric, &|dt| {
            Cell::Number(((dt.month() - 1) / 3 + 1) as f64)
        }),
        part("is_weekend", ColumnType::Boolean, &|dt| {
            Cell::Boolean(matches!(dt.weekday(), Weekday::Sat | Weekday::Sun))
        }),
        part("days_from_today", ColumnType::Numeric, &|dt| {
            Cell::Number((today - dt.date()).num_days() as f64)
        }),
    ])
}

/// True when the text has at least one cased letter and no lowercase ones.
fn is_upper(s: &str) -> bool {
    let mut cased = false;
    for ch in s.chars() {
        if ch.is_lowercase() {
            return false;
        }
        if ch.is_uppercase() {
            cased = true;
        }
    }
    cased
}

/// Length, word count, digit/special-character flags and an all-caps flag.
pub fn text_stats(column: &Column) -> Result<Vec<Column>> {
    if !column.column_type().is_textual() {
        return Err(CleaningError::TypeConversionFailed {
            column: column.name().to_string(),
            target_type: ColumnType::Text.to_string(),
            reason: format!("column is {}", column.column_type()),
        });
    }
    let name = column.name();

    let stat = |suffix: &str, column_type: ColumnType, f: &dyn Fn(&str) -> Cell| {
        let cells = column
            .cells()
            .iter()
            .map(|c| c.as_str().map_or(Cell::Null, f))
            .collect();
        Column::with_type(format!("{}_{}", name, suffix), column_type, cells)
    };

    Ok(vec![
        stat("length", ColumnType::Numeric, &|s| Cell::Number(s.chars().count() as f64)),
        stat("word_count", ColumnType::Numeric, &|s| {
            Cell::Number(s.split_whitespace().count() as f64)
        }),
        stat("has_numbers", ColumnType::Boolean, &|s| {
            Cell::Boolean(s.chars().any(|c| c.is_ascii_digit()))
        }),
        stat("has_special", ColumnType::Boolean, &|s| {
            Cell::Boolean(s.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()))
        }),
        stat("is_upper", ColumnType::Boolean, &|s| Cell::Boolean(is_upper(s))),
    ])
}

/// Per-row sum, average, max, min and range over numeric columns. Nulls are
/// skipped; a row with no values gets a 0 sum and nulls elsewhere.
pub fn row_aggregates(table: &Table, columns: &[String]) -> Result<Vec<Column>> {
    let sources = columns
        .iter()
        .map(|name| {
            let column = table.require_column(name)?;
            require_type(column, ColumnType::Numeric)?;
            Ok(column)
        })
        .collect::<Result<Vec<&Column>>>()?;

    if sources.is_empty() {
        return Err(CleaningError::InvalidConfig(
            "row aggregates need at least one column".to_string(),
        ));
    }

    let mut sum = Vec::with_capacity(table.height());
    let mut average = Vec::with_capacity(table.height());
    let mut max = Vec::with_capacity(table.height());
    let mut min = Vec::with_capacity(table.height());
    let mut range = Vec::with_capacity(table.height());

    for row in 0..table.height() {
        let values: Vec<f64> = sources
            .iter()
            .filter_map(|c| c.get(row).and_then(Cell::as_f64))
            .collect();
        let total: f64 = values.iter().sum();
        sum.push(Cell::Number(total));

        if values.is_empty() {
            average.push(Cell::Null);
            max.push(Cell::Null);
            min.push(Cell::Null);
            range.push(Cell::Null);
            continue;
        }

        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        average.push(Cell::Number(total / values.len() as f64));
        max.push(Cell::Number(hi));
        min.push(Cell::Number(lo));
        range.push(Cell::Number(hi - lo));
    }

    Ok(vec![
        Column::with_type("total_sum", ColumnType::Numeric, sum),
        Column::with_type("average", ColumnType::Numeric, average),
        Column::with_type("max_value", ColumnType::Numeric, max),
        Column::with_type("min_value", ColumnType::Numeric, min),
        Column::with_type("value_range", ColumnType::Numeric, range),
    ])
}

/// Domain label of each email: the text between `@` and the next `.`.
pub fn email_domain(column: &Column) -> Result<Column> {
    if !column.column_type().is_textual() {
        return Err(CleaningError::TypeConversionFailed {
            column: column.name().to_string(),
            target_type: ColumnType::Text.to_string(),
            reason: format!("column is {}", column.column_type()),
        });
    }

    let cells = column
        .cells()
        .iter()
        .map(|c| {
            c.as_str()
                .and_then(|s| s.split_once('@'))
                .map(|(_, rest)| rest.split('.').next().unwrap_or(rest))
                .filter(|domain| !domain.is_empty())
                .map_or(Cell::Null, Cell::from)
        })
        .collect();

    Ok(Column::with_type(
        format!("{}_domain", column.name()),
        ColumnType::Text,
        cells,
    ))
}
