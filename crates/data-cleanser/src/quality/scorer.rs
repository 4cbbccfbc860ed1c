//! Five-dimension quality assessment.
//!
//! Completeness and uniqueness are ratios in `[0, 1]`; consistency, accuracy
//! and validity are 0-100 scores with a linear penalty per issue. The overall
//! score combines the 0-100 forms of all of them except validity.
//!
//! Tables straight from a loader hold text cells only. Consistency and
//! validity rules look at numbers and dates, so they run on a copy where
//! text columns have been through type inference.

use crate::cleaner::ConsistencyChecker;
use crate::pipeline::iqr_bounds;
use crate::profiler::{TypeInferencer, coerce_column};
use crate::table::{Cell, CellKey, ColumnType, Table};
use crate::types::{Severity, ValidationIssue};
use crate::utils::{
    EMAIL_KEYWORDS, PHONE_KEYWORDS, POSITIVE_KEYWORDS, is_valid_phone, looks_like_email,
    name_contains_any,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

const CONSISTENCY_PENALTY: f64 = 10.0;
const ACCURACY_PENALTY: f64 = 15.0;
const VALIDITY_PENALTY: f64 = 12.0;

const COMPLETENESS_WEIGHT: f64 = 0.30;
const UNIQUENESS_WEIGHT: f64 = 0.25;
const CONSISTENCY_WEIGHT: f64 = 0.25;
const ACCURACY_WEIGHT: f64 = 0.20;

/// Fence multiplier for "extreme" outliers in the validity dimension.
const EXTREME_IQR_MULTIPLIER: f64 = 3.0;
const EXTREME_OUTLIER_RATIO: f64 = 0.05;
/// Invalid share above which an accuracy issue is Medium.
const INVALID_FORMAT_RATIO: f64 = 0.10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub rows: usize,
    pub columns: usize,
    /// Rough in-memory size of the cells.
    pub memory_bytes: usize,
    pub column_types: BTreeMap<String, ColumnType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completeness {
    pub missing_count: usize,
    pub missing_percentage: f64,
    /// `1 - missing / total`
    pub score: f64,
    pub missing_by_column: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Uniqueness {
    pub duplicate_count: usize,
    pub duplicate_percentage: f64,
    /// `(rows - duplicates) / rows`
    pub score: f64,
    /// Distinct over non-null values, per column.
    pub column_uniqueness: BTreeMap<String, f64>,
}

/// A penalized dimension: its issues and the resulting 0-100 score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub issues: Vec<ValidationIssue>,
    pub score: f64,
}

impl DimensionScore {
    fn with_penalty(issues: Vec<ValidationIssue>, penalty: f64) -> Self {
        let score = (100.0 - penalty * issues.len() as f64).max(0.0);
        Self { issues, score }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub basic_info: BasicInfo,
    pub completeness: Completeness,
    pub uniqueness: Uniqueness,
    pub consistency: DimensionScore,
    pub accuracy: DimensionScore,
    pub validity: DimensionScore,
    /// Weighted score in `[0, 100]`, one decimal.
    pub overall_score: f64,
}

impl QualityAssessment {
    /// Every issue across the three penalized dimensions.
    pub fn all_issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.consistency
            .issues
            .iter()
            .chain(&self.accuracy.issues)
            .chain(&self.validity.issues)
    }
}

/// Computes [`QualityAssessment`]s.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    consistency: ConsistencyChecker,
    inferencer: TypeInferencer,
}

impl QualityScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin "now" for the future-date rule.
    pub fn with_reference_time(now: NaiveDateTime) -> Self {
        Self {
            consistency: ConsistencyChecker::with_reference_time(now),
            inferencer: TypeInferencer::default(),
        }
    }

    pub fn assess(&self, table: &Table) -> QualityAssessment {
        let basic_info = basic_info(table);
        let completeness = completeness(table);
        let uniqueness = uniqueness(table);
        let typed = self.typed_view(table);
        let consistency =
            DimensionScore::with_penalty(self.consistency.check(&typed), CONSISTENCY_PENALTY);
        let accuracy = DimensionScore::with_penalty(accuracy_issues(table), ACCURACY_PENALTY);
        let validity = DimensionScore::with_penalty(validity_issues(&typed), VALIDITY_PENALTY);

        let weighted = completeness.score * 100.0 * COMPLETENESS_WEIGHT
            + uniqueness.score * 100.0 * UNIQUENESS_WEIGHT
            + consistency.score * CONSISTENCY_WEIGHT
            + accuracy.score * ACCURACY_WEIGHT;
        let overall_score = ((weighted * 10.0).round() / 10.0).clamp(0.0, 100.0);

        debug!(
            "Quality: completeness {:.3}, uniqueness {:.3}, consistency {}, accuracy {}, validity {}, overall {}",
            completeness.score,
            uniqueness.score,
            consistency.score,
            accuracy.score,
            validity.score,
            overall_score
        );

        QualityAssessment {
            basic_info,
            completeness,
            uniqueness,
            consistency,
            accuracy,
            validity,
            overall_score,
        }
    }
}

impl QualityScorer {
    /// Copy of `table` with text columns coerced to the type inference picks.
    /// Values that fail to coerce become null in the copy only.
    fn typed_view(&self, table: &Table) -> Table {
        let needs_inference = |t: ColumnType| matches!(t, ColumnType::Text | ColumnType::Unknown);
        if !table.columns().iter().any(|c| needs_inference(c.column_type())) {
            return table.clone();
        }

        let columns = table
            .columns()
            .iter()
            .map(|column| {
                if !needs_inference(column.column_type()) {
                    return column.clone();
                }
                match self.inferencer.infer(column) {
                    target @ (ColumnType::Numeric | ColumnType::DateTime) => {
                        coerce_column(column, target, self.inferencer.date_format()).0
                    }
                    _ => column.clone(),
                }
            })
            .collect();
        Table::new(columns).unwrap_or_else(|_| table.clone())
    }
}

fn cell_size(cell: &Cell) -> usize {
    match cell {
        Cell::Null | Cell::Boolean(_) => 1,
        Cell::Number(_) => 8,
        Cell::DateTime(_) => 12,
        Cell::Text(s) => s.len() + std::mem::size_of::<String>(),
    }
}

fn basic_info(table: &Table) -> BasicInfo {
    BasicInfo {
        rows: table.height(),
        columns: table.width(),
        memory_bytes: table
            .columns()
            .iter()
            .flat_map(|c| c.cells())
            .map(cell_size)
            .sum(),
        column_types: table
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.column_type()))
            .collect(),
    }
}

fn completeness(table: &Table) -> Completeness {
    let total = table.total_cells();
    let missing = table.null_count();
    let ratio = if total == 0 {
        0.0
    } else {
        missing as f64 / total as f64
    };
    Completeness {
        missing_count: missing,
        missing_percentage: ratio * 100.0,
        score: 1.0 - ratio,
        missing_by_column: table
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.null_count()))
            .collect(),
    }
}

/// Rows equal to an earlier row, across all columns.
pub(crate) fn duplicate_rows(table: &Table) -> usize {
    let all: Vec<usize> = (0..table.width()).collect();
    let mut seen: HashSet<Vec<CellKey>> = HashSet::new();
    (0..table.height())
        .filter(|&i| !seen.insert(table.row_key(i, &all)))
        .count()
}

fn uniqueness(table: &Table) -> Uniqueness {
    let rows = table.height();
    let duplicates = duplicate_rows(table);
    let ratio = if rows == 0 {
        0.0
    } else {
        duplicates as f64 / rows as f64
    };
    Uniqueness {
        duplicate_count: duplicates,
        duplicate_percentage: ratio * 100.0,
        score: 1.0 - ratio,
        column_uniqueness: table
            .columns()
            .iter()
            .map(|c| {
                let non_null = c.non_null_count();
                let value = if non_null == 0 {
                    0.0
                } else {
                    c.distinct_count() as f64 / non_null as f64
                };
                (c.name().to_string(), value)
            })
            .collect(),
    }
}

/// Invalid emails and phone numbers in columns named for them.
fn accuracy_issues(table: &Table) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for column in table.columns() {
        let name = column.name();
        let (kind, is_valid): (&str, fn(&str) -> bool) =
            if name_contains_any(name, &EMAIL_KEYWORDS) {
                ("email", looks_like_email)
            } else if name_contains_any(name, &PHONE_KEYWORDS) {
                ("phone", is_valid_phone)
            } else {
                continue;
            };

        let values: Vec<String> = column.cells().iter().filter_map(|c| c.render("%Y-%m-%d")).collect();
        if values.is_empty() {
            continue;
        }
        let invalid = values.iter().filter(|v| !is_valid(v)).count();
        if invalid == 0 {
            continue;
        }

        let severity = if invalid as f64 / values.len() as f64 > INVALID_FORMAT_RATIO {
            Severity::Medium
        } else {
            Severity::Low
        };
        issues.push(ValidationIssue::new(
            name,
            format!("{} invalid {} values", invalid, kind),
            severity,
            invalid,
        ));
    }

    issues
}

/// Extreme outlier ratios and negative values where only positives make sense.
fn validity_issues(table: &Table) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for column in table
        .columns()
        .iter()
        .filter(|c| c.column_type() == ColumnType::Numeric)
    {
        let values = column.numeric_values();
        if values.is_empty() {
            continue;
        }

        if let Some(bounds) = iqr_bounds(&values, EXTREME_IQR_MULTIPLIER) {
            let extreme = values.iter().filter(|v| !bounds.contains(**v)).count();
            let ratio = extreme as f64 / values.len() as f64;
            if ratio > EXTREME_OUTLIER_RATIO {
                issues.push(ValidationIssue::new(
                    column.name(),
                    format!("{:.1}% extreme outliers", ratio * 100.0),
                    Severity::Medium,
                    extreme,
                ));
            }
        }

        if name_contains_any(column.name(), &POSITIVE_KEYWORDS) {
            let negative = values.iter().filter(|v| **v < 0.0).count();
            if negative > 0 {
                issues.push(ValidationIssue::new(
                    column.name(),
                    format!("{} negative values", negative),
                    Severity::High,
                    negative,
                ));
            }
        }
    }

    issues
}
