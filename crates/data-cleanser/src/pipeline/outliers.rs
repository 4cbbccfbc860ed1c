//! Outlier detection module.
//!
//! Flags anomalous values in numeric columns with either the IQR rule or the
//! z-score rule. Detection only by default; removal and capping are opt-in.

use crate::config::{IQR_MULTIPLIER, OutlierAction, OutlierMethod};
use crate::table::{Cell, Column, ColumnType, Table};
use crate::types::{ActionRecord, Severity, StageOutput, ValidationIssue};
use crate::utils::{mean, quantile_sorted, sample_std, sorted};
use tracing::{debug, info, warn};

pub(crate) const STAGE: &str = "detect-outliers";

/// Share of flagged values above which an outlier issue is Medium.
const MEDIUM_OUTLIER_RATIO: f64 = 0.05;

/// Closed interval of acceptable values. Anything strictly outside is an outlier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }
}

/// IQR fences with a custom multiplier.
pub fn iqr_bounds(values: &[f64], multiplier: f64) -> Option<OutlierBounds> {
    let sorted = sorted(values);
    let q1 = quantile_sorted(&sorted, 0.25)?;
    let q3 = quantile_sorted(&sorted, 0.75)?;
    let iqr = q3 - q1;
    Some(OutlierBounds {
        lower: q1 - multiplier * iqr,
        upper: q3 + multiplier * iqr,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct OutlierDetector {
    method: OutlierMethod,
    threshold: f64,
    action: OutlierAction,
}

impl OutlierDetector {
    pub fn new(method: OutlierMethod, threshold: f64, action: OutlierAction) -> Self {
        Self {
            method,
            threshold,
            action,
        }
    }

    /// Acceptable range for `values`, or `None` when nothing can be flagged.
    pub fn bounds(&self, values: &[f64]) -> Option<OutlierBounds> {
        match self.method {
            OutlierMethod::Iqr => iqr_bounds(values, IQR_MULTIPLIER),
            OutlierMethod::ZScore => {
                let m = mean(values)?;
                let std = sample_std(values)?;
                if std == 0.0 || !std.is_finite() {
                    return None;
                }
                Some(OutlierBounds {
                    lower: m - self.threshold * std,
                    upper: m + self.threshold * std,
                })
            }
        }
    }

    /// Row indices of flagged values in a numeric column.
    pub fn detect(&self, column: &Column) -> Vec<usize> {
        let Some(bounds) = self.bounds(&column.numeric_values()) else {
            return Vec::new();
        };
        column
            .cells()
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_f64().filter(|v| !bounds.contains(*v)).map(|_| i))
            .collect()
    }

    pub fn apply(&self, table: &Table) -> StageOutput {
        let mut records = Vec::new();
        let mut issues = Vec::new();
        let mut output = table.clone();
        let mut remove = vec![false; table.height()];

        for (index, column) in table
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.column_type() == ColumnType::Numeric)
        {
            let flagged = self.detect(column);
            if flagged.is_empty() {
                continue;
            }

            let ratio = flagged.len() as f64 / column.non_null_count().max(1) as f64;
            let severity = if ratio > MEDIUM_OUTLIER_RATIO {
                Severity::Medium
            } else {
                Severity::Low
            };
            let method = match self.method {
                OutlierMethod::Iqr => "IQR",
                OutlierMethod::ZScore => "z-score",
            };
            debug!("'{}': {} outliers by {}", column.name(), flagged.len(), method);
            issues.push(ValidationIssue::new(
                column.name(),
                format!("{} outliers detected ({} rule)", flagged.len(), method),
                severity,
                flagged.len(),
            ));

            let summary = match self.action {
                OutlierAction::Flag => format!("flagged {} outliers", flagged.len()),
                OutlierAction::Remove => {
                    for &i in &flagged {
                        remove[i] = true;
                    }
                    format!("flagged {} outliers for removal", flagged.len())
                }
                OutlierAction::Cap => {
                    if let Some(bounds) = self.bounds(&column.numeric_values()) {
                        let cells = column
                            .cells()
                            .iter()
                            .map(|c| match c {
                                Cell::Number(v) => Cell::Number(bounds.clamp(*v)),
                                other => other.clone(),
                            })
                            .collect();
                        let capped = column.clone().with_cells(cells);
                        if let Err(e) = output.replace_column(index, capped) {
                            warn!("Failed to cap outliers in {}: {}", column.name(), e);
                        }
                    }
                    format!("capped {} outliers", flagged.len())
                }
            };

            records.push(
                ActionRecord::success(STAGE, summary)
                    .for_column(column.name())
                    .with_values(flagged.len()),
            );
        }

        let removed = remove.iter().filter(|r| **r).count();
        if removed > 0 {
            let keep: Vec<bool> = remove.iter().map(|r| !r).collect();
            output = output.filter_rows(&keep);
            info!("Removed {} rows containing outliers", removed);
            records.push(
                ActionRecord::success(STAGE, format!("removed {} rows containing outliers", removed))
                    .with_rows(removed),
            );
        }

        if records.is_empty() {
            records.push(ActionRecord::success(STAGE, "no outliers detected"));
        }

        StageOutput {
            table: output,
            records,
            issues,
        }
    }
}
