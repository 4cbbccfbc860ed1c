//! Logical consistency rules.
//!
//! Rules are chosen per column from its type and name. Findings are reported
//! as [`ValidationIssue`]s; the data itself is never changed.

use crate::table::{Column, ColumnType, Table};
use crate::types::{ActionRecord, Severity, StageOutput, ValidationIssue};
use crate::utils::{POSITIVE_KEYWORDS, name_contains_any};
use chrono::{Local, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

pub(crate) const STAGE: &str = "check-consistency";

const MAX_AGE: f64 = 150.0;

#[derive(Debug, Clone)]
pub struct ConsistencyChecker {
    now: NaiveDateTime,
    earliest: NaiveDateTime,
}

impl Default for ConsistencyChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsistencyChecker {
    /// Checker that treats the current local time as "now".
    pub fn new() -> Self {
        Self::with_reference_time(Local::now().naive_local())
    }

    pub fn with_reference_time(now: NaiveDateTime) -> Self {
        let earliest = NaiveDate::from_ymd_opt(1900, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        Self { now, earliest }
    }

    /// Run every applicable rule over every column.
    pub fn check(&self, table: &Table) -> Vec<ValidationIssue> {
        table
            .columns()
            .iter()
            .flat_map(|column| self.check_column(column))
            .collect()
    }

    fn check_column(&self, column: &Column) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let name = column.name();

        match column.column_type() {
            ColumnType::DateTime => {
                let dates: Vec<NaiveDateTime> =
                    column.cells().iter().filter_map(|c| c.as_datetime()).collect();

                let future = dates.iter().filter(|d| **d > self.now).count();
                if future > 0 {
                    issues.push(ValidationIssue::new(
                        name,
                        format!("{} future dates", future),
                        Severity::Medium,
                        future,
                    ));
                }

                let too_old = dates.iter().filter(|d| **d < self.earliest).count();
                if too_old > 0 {
                    issues.push(ValidationIssue::new(
                        name,
                        format!("{} dates before 1900", too_old),
                        Severity::Medium,
                        too_old,
                    ));
                }
            }
            ColumnType::Numeric => {
                let values = column.numeric_values();
                let lower = name.to_lowercase();

                if name_contains_any(name, &POSITIVE_KEYWORDS) {
                    let negative = values.iter().filter(|v| **v < 0.0).count();
                    if negative > 0 {
                        issues.push(ValidationIssue::new(
                            name,
                            format!("{} negative values", negative),
                            Severity::High,
                            negative,
                        ));
                    }
                }

                if lower.contains("age") {
                    let unrealistic = values.iter().filter(|v| **v > MAX_AGE).count();
                    if unrealistic > 0 {
                        issues.push(ValidationIssue::new(
                            name,
                            format!("{} unrealistic ages (> {})", unrealistic, MAX_AGE),
                            Severity::High,
                            unrealistic,
                        ));
                    }
                }

                if lower.contains("percent") {
                    let out_of_range = values
                        .iter()
                        .filter(|v| !(0.0..=100.0).contains(*v))
                        .count();
                    if out_of_range > 0 {
                        issues.push(ValidationIssue::new(
                            name,
                            format!("{} percentages outside 0-100", out_of_range),
                            Severity::High,
                            out_of_range,
                        ));
                    }
                }
            }
            _ => {}
        }

        issues
    }

    pub fn apply(&self, table: &Table) -> StageOutput {
        let issues = self.check(table);
        for issue in &issues {
            warn!("Consistency issue in '{}': {}", issue.column, issue.description);
        }
        debug!("Consistency check found {} issues", issues.len());

        let summary = if issues.is_empty() {
            "no consistency issues found".to_string()
        } else {
            format!("found {} consistency issues", issues.len())
        };
        let flagged = issues.iter().map(|i| i.count).sum();

        StageOutput {
            table: table.clone(),
            records: vec![ActionRecord::success(STAGE, summary).with_values(flagged)],
            issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn checker() -> ConsistencyChecker {
        ConsistencyChecker::with_reference_time(at(2024, 6, 1))
    }

    #[test]
    fn test_future_and_ancient_dates() {
        let table = Table::new(vec![Column::new(
            "signup_date",
            vec![
                Cell::from(at(2023, 1, 1)),
                Cell::from(at(2030, 1, 1)),
                Cell::from(at(1850, 5, 5)),
                Cell::Null,
            ],
        )])
        .unwrap();

        let issues = checker().check(&table);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.severity == Severity::Medium));
        assert_eq!(issues[0].count, 1);
    }

    #[test]
    fn test_negative_positive_keyword() {
        let table = Table::new(vec![
            Column::from_values("unit_price", vec![10.0, -2.0, 3.0]),
            Column::from_values("delta", vec![-1.0, -2.0, 3.0]),
        ])
        .unwrap();

        let issues = checker().check(&table);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].column, "unit_price");
        assert_eq!(issues[0].severity, Severity::High);
    }

    #[test]
    fn test_age_and_percent_ranges() {
        let table = Table::new(vec![
            Column::from_values("age", vec![30.0, 200.0]),
            Column::from_values("discount_percent", vec![50.0, 120.0]),
        ])
        .unwrap();

        let issues = checker().check(&table);
        let descriptions: Vec<&str> = issues.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(
            descriptions,
            vec!["1 unrealistic ages (> 150)", "1 percentages outside 0-100"]
        );
    }

    #[test]
    fn test_apply_does_not_mutate() {
        let table = Table::new(vec![Column::from_values("age", vec![-1.0])]).unwrap();
        let output = checker().apply(&table);
        assert_eq!(output.table, table);
        assert_eq!(output.issues.len(), 1);
        assert_eq!(output.records[0].values_affected, 1);
    }
}
