//! Shared result types: action records, the cleaning log and validation issues.

use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Action log
// ============================================================================

/// Whether a stage (or a single column within a stage) did its job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Success,
    Failure { reason: String },
}

impl ActionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// One entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Stage that produced the record (e.g. `missing-data`).
    pub stage: String,
    /// Column the record is about, if it is column-specific.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub outcome: ActionOutcome,
    /// Human-readable summary.
    pub summary: String,
    /// Rows removed or otherwise touched.
    pub rows_affected: usize,
    /// Individual values filled, rewritten or flagged.
    pub values_affected: usize,
}

impl ActionRecord {
    pub fn success(stage: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            column: None,
            outcome: ActionOutcome::Success,
            summary: summary.into(),
            rows_affected: 0,
            values_affected: 0,
        }
    }

    pub fn failure(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            stage: stage.into(),
            column: None,
            outcome: ActionOutcome::Failure {
                reason: reason.clone(),
            },
            summary: reason,
            rows_affected: 0,
            values_affected: 0,
        }
    }

    pub fn for_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows_affected = rows;
        self
    }

    pub fn with_values(mut self, values: usize) -> Self {
        self.values_affected = values;
        self
    }
}

impl fmt::Display for ActionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.outcome.is_success() { "ok" } else { "FAILED" };
        match &self.column {
            Some(column) => write!(f, "[{}] {} ({}): {}", marker, self.stage, column, self.summary),
            None => write!(f, "[{}] {}: {}", marker, self.stage, self.summary),
        }
    }
}

/// Append-only, ordered audit trail of what the stages did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CleaningLog {
    records: Vec<ActionRecord>,
}

/// The feature engine keeps the same kind of trail.
pub type TransformationLog = CleaningLog;

impl CleaningLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ActionRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = ActionRecord>) {
        self.records.extend(records);
    }

    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ActionRecord> {
        self.records.iter().filter(|r| !r.outcome.is_success())
    }

    /// Records produced by one stage, in order.
    pub fn for_stage<'a>(&'a self, stage: &'a str) -> impl Iterator<Item = &'a ActionRecord> {
        self.records.iter().filter(move |r| r.stage == stage)
    }

    /// Plain-text lines, one per record.
    pub fn summary_lines(&self) -> Vec<String> {
        self.records.iter().map(ToString::to_string).collect()
    }
}

// ============================================================================
// Validation issues
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A data problem found by a checker. Informational, never fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub column: String,
    pub description: String,
    pub severity: Severity,
    /// Number of offending values.
    pub count: usize,
}

impl ValidationIssue {
    pub fn new(
        column: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        count: usize,
    ) -> Self {
        Self {
            column: column.into(),
            description: description.into(),
            severity,
            count,
        }
    }
}

// ============================================================================
// Entry point outputs
// ============================================================================

/// What a single stage hands back to the orchestrator.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub table: Table,
    pub records: Vec<ActionRecord>,
    pub issues: Vec<ValidationIssue>,
}

impl StageOutput {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            records: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn with_record(mut self, record: ActionRecord) -> Self {
        self.records.push(record);
        self
    }
}

/// Result of `clean`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanOutput {
    pub table: Table,
    pub log: CleaningLog,
    /// Outlier and consistency findings gathered along the way.
    pub issues: Vec<ValidationIssue>,
}

/// Result of `transform`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformOutput {
    pub table: Table,
    pub log: TransformationLog,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_ordered_and_append_only() {
        let mut log = CleaningLog::new();
        log.push(ActionRecord::success("preprocess", "typed 3 columns"));
        log.push(ActionRecord::failure("dedupe", "unknown key column"));
        log.push(ActionRecord::success("missing-data", "filled 2").for_column("age"));

        assert_eq!(log.len(), 3);
        let stages: Vec<&str> = log.records().iter().map(|r| r.stage.as_str()).collect();
        assert_eq!(stages, vec!["preprocess", "dedupe", "missing-data"]);
        assert_eq!(log.failures().count(), 1);
        assert_eq!(log.for_stage("missing-data").count(), 1);
    }

    #[test]
    fn test_record_display() {
        let record = ActionRecord::success("missing-data", "filled 2 values with mean")
            .for_column("age")
            .with_values(2);
        assert_eq!(record.to_string(), "[ok] missing-data (age): filled 2 values with mean");
    }

    #[test]
    fn test_log_serializes_as_list() {
        let mut log = CleaningLog::new();
        log.push(ActionRecord::failure("dedupe", "boom"));
        let json = serde_json::to_value(&log).expect("Should serialize");
        assert!(json.is_array());
        assert_eq!(json[0]["outcome"]["status"], "failure");
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }
}
