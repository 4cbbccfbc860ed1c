//! Before/after comparison and the validation report.

use super::scorer::{QualityAssessment, QualityScorer};
use crate::table::{ColumnType, Table};
use crate::utils::{kurtosis, mean, median, pearson, sample_std, skewness};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::info;

/// |r| above which two numeric columns are reported as strongly correlated.
const STRONG_CORRELATION: f64 = 0.8;

const LOW_SCORE: f64 = 80.0;
const HIGH_MISSING_PERCENTAGE: f64 = 10.0;
const HIGH_DUPLICATE_PERCENTAGE: f64 = 5.0;

/// Row, column, missing-value and score deltas between two assessments.
///
/// Deltas are `cleaned - original`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityComparison {
    pub rows_before: usize,
    pub rows_after: usize,
    pub rows_delta: i64,
    pub columns_before: usize,
    pub columns_after: usize,
    pub columns_delta: i64,
    pub missing_before: usize,
    pub missing_after: usize,
    pub missing_delta: i64,
    pub score_before: f64,
    pub score_after: f64,
    pub score_delta: f64,
}

pub fn compare(original: &QualityAssessment, cleaned: &QualityAssessment) -> QualityComparison {
    let delta = |before: usize, after: usize| after as i64 - before as i64;
    QualityComparison {
        rows_before: original.basic_info.rows,
        rows_after: cleaned.basic_info.rows,
        rows_delta: delta(original.basic_info.rows, cleaned.basic_info.rows),
        columns_before: original.basic_info.columns,
        columns_after: cleaned.basic_info.columns,
        columns_delta: delta(original.basic_info.columns, cleaned.basic_info.columns),
        missing_before: original.completeness.missing_count,
        missing_after: cleaned.completeness.missing_count,
        missing_delta: delta(
            original.completeness.missing_count,
            cleaned.completeness.missing_count,
        ),
        score_before: original.overall_score,
        score_after: cleaned.overall_score,
        score_delta: ((cleaned.overall_score - original.overall_score) * 10.0).round() / 10.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionStats {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub left: String,
    pub right: String,
    pub coefficient: f64,
}

/// Everything `validate` produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub generated_at: NaiveDateTime,
    pub original: QualityAssessment,
    pub cleaned: QualityAssessment,
    pub comparison: QualityComparison,
    pub distributions: Vec<DistributionStats>,
    pub strong_correlations: Vec<Correlation>,
    pub recommendations: Vec<String>,
}

impl ValidationReport {
    /// Assessment of the cleaned table.
    pub fn assessment(&self) -> &QualityAssessment {
        &self.cleaned
    }
}

impl QualityScorer {
    /// Compare the quality of `original` and `cleaned`.
    pub fn compare(&self, original: &Table, cleaned: &Table) -> QualityComparison {
        compare(&self.assess(original), &self.assess(cleaned))
    }

    /// Assess both tables and build the full report for the cleaned one.
    pub fn validate(&self, original: &Table, cleaned: &Table) -> ValidationReport {
        let original_assessment = self.assess(original);
        let cleaned_assessment = self.assess(cleaned);
        let comparison = compare(&original_assessment, &cleaned_assessment);
        info!(
            "Quality score {} -> {} ({:+})",
            comparison.score_before, comparison.score_after, comparison.score_delta
        );

        ValidationReport {
            generated_at: Local::now().naive_local(),
            distributions: distributions(cleaned),
            strong_correlations: strong_correlations(cleaned),
            recommendations: recommendations(&cleaned_assessment),
            original: original_assessment,
            cleaned: cleaned_assessment,
            comparison,
        }
    }
}

fn distributions(table: &Table) -> Vec<DistributionStats> {
    table
        .columns()
        .iter()
        .filter(|c| c.column_type() == ColumnType::Numeric)
        .map(|c| {
            let values = c.numeric_values();
            DistributionStats {
                column: c.name().to_string(),
                count: values.len(),
                mean: mean(&values),
                median: median(&values),
                std: sample_std(&values),
                skewness: skewness(&values),
                kurtosis: kurtosis(&values),
            }
        })
        .collect()
}

fn strong_correlations(table: &Table) -> Vec<Correlation> {
    let numeric: Vec<_> = table
        .columns()
        .iter()
        .filter(|c| c.column_type() == ColumnType::Numeric)
        .collect();

    let mut found = Vec::new();
    for (i, left) in numeric.iter().enumerate() {
        for right in &numeric[i + 1..] {
            let pairs: Vec<(f64, f64)> = left
                .cells()
                .iter()
                .zip(right.cells())
                .filter_map(|(a, b)| Some((a.as_f64()?, b.as_f64()?)))
                .collect();
            if let Some(r) = pearson(&pairs)
                && r.abs() > STRONG_CORRELATION
            {
                found.push(Correlation {
                    left: left.name().to_string(),
                    right: right.name().to_string(),
                    coefficient: r,
                });
            }
        }
    }
    found
}

fn recommendations(assessment: &QualityAssessment) -> Vec<String> {
    let mut out = Vec::new();

    if assessment.overall_score < LOW_SCORE {
        out.push(format!(
            "Overall quality score is {:.1}; review the remaining issues before using this data",
            assessment.overall_score
        ));
    }
    if assessment.completeness.missing_percentage > HIGH_MISSING_PERCENTAGE {
        out.push(format!(
            "{:.1}% of values are still missing; consider a different imputation strategy",
            assessment.completeness.missing_percentage
        ));
    }
    if assessment.uniqueness.duplicate_percentage > HIGH_DUPLICATE_PERCENTAGE {
        out.push(format!(
            "{:.1}% of rows are duplicates; check the duplicate key",
            assessment.uniqueness.duplicate_percentage
        ));
    }
    if !assessment.consistency.issues.is_empty() {
        out.push(format!(
            "{} consistency issues remain (future dates, negative or out-of-range values)",
            assessment.consistency.issues.len()
        ));
    }
    if !assessment.accuracy.issues.is_empty() {
        out.push(format!(
            "{} columns hold invalid emails or phone numbers",
            assessment.accuracy.issues.len()
        ));
    }

    if out.is_empty() {
        out.push("Data quality looks good; no further action needed".to_string());
    }
    out
}
