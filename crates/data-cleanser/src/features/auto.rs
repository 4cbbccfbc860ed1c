//! Automatic feature engineering for an already cleaned table.
//!
//! [`FeatureEngine::auto_transform`] picks operations from column names and
//! types instead of taking them from the caller. It runs these steps in order:
//!
//! 1. derive date parts, text statistics and row aggregates
//! 2. replace keyword values (yes/no, education levels, sizes) with codes
//! 3. merge name and address parts, split email domains
//! 4. convert mostly-numeric text to numbers and 0/1 columns to booleans
//! 5. add a z-score `<column>_normalized` next to each varying numeric column
//!
//! A failing step is logged and the next one sees the table as it was before.

use super::{FeatureEngine, FeatureOp, NormalizeMethod, normalize, with_columns};
use crate::error::Result;
use crate::table::{Cell, CellKey, Column, ColumnType, Table};
use crate::types::{ActionRecord, TransformOutput, TransformationLog};
use crate::utils::{EMAIL_KEYWORDS, name_contains_any, parse_number, sample_std};
use std::collections::HashSet;
use tracing::{debug, info, warn};

// =============================================================================
// Keyword Tables
// =============================================================================

const BOOLEAN_KEYWORDS: [&str; 4] = ["bool", "flag", "is_", "has_"];
const EDUCATION_KEYWORDS: [&str; 3] = ["education", "degree", "การศึกษา"];
const SIZE_KEYWORDS: [&str; 2] = ["size", "ขนาด"];

const NAME_KEYWORDS: [&str; 4] = ["first_name", "last_name", "ชื่อ", "นามสกุล"];
const ADDRESS_KEYWORDS: [&str; 6] = ["address", "street", "city", "province", "ที่อยู่", "จังหวัด"];

const BOOLEAN_VALUES: [(&str, bool); 12] = [
    ("yes", true),
    ("no", false),
    ("y", true),
    ("n", false),
    ("true", true),
    ("false", false),
    ("1", true),
    ("0", false),
    ("ใช่", true),
    ("ไม่ใช่", false),
    ("ใช้", true),
    ("ไม่ใช้", false),
];

const EDUCATION_VALUES: [(&str, f64); 12] = [
    ("ประถม", 1.0),
    ("มัธยม", 2.0),
    ("ปวช", 3.0),
    ("ปวส", 4.0),
    ("ปริญญาตรี", 5.0),
    ("ปริญญาโท", 6.0),
    ("ปริญญาเอก", 7.0),
    ("primary", 1.0),
    ("secondary", 2.0),
    ("bachelor", 5.0),
    ("master", 6.0),
    ("phd", 7.0),
];

const SIZE_VALUES: [(&str, f64); 10] = [
    ("เล็ก", 1.0),
    ("กลาง", 2.0),
    ("ใหญ่", 3.0),
    ("small", 1.0),
    ("medium", 2.0),
    ("large", 3.0),
    ("s", 1.0),
    ("m", 2.0),
    ("l", 3.0),
    ("xl", 4.0),
];

/// Numeric columns with these suffixes are identifiers or counts, not measures.
const NORMALIZE_SKIP_SUFFIXES: [&str; 5] = ["_id", "_code", "_count", "_length", "_normalized"];

/// Share of all rows that must parse as numbers before a text column converts.
const NUMERIC_SHARE: f64 = 0.8;

type Lookup = fn(&str) -> Option<Cell>;

fn boolean_value(s: &str) -> Option<Cell> {
    BOOLEAN_VALUES
        .iter()
        .find(|(k, _)| *k == s)
        .map(|(_, v)| Cell::Boolean(*v))
}

fn education_value(s: &str) -> Option<Cell> {
    EDUCATION_VALUES
        .iter()
        .find(|(k, _)| *k == s)
        .map(|(_, v)| Cell::Number(*v))
}

fn size_value(s: &str) -> Option<Cell> {
    SIZE_VALUES
        .iter()
        .find(|(k, _)| *k == s)
        .map(|(_, v)| Cell::Number(*v))
}

fn lookup_for(name: &str) -> Option<Lookup> {
    if name_contains_any(name, &BOOLEAN_KEYWORDS) {
        Some(boolean_value)
    } else if name_contains_any(name, &EDUCATION_KEYWORDS) {
        Some(education_value)
    } else if name_contains_any(name, &SIZE_KEYWORDS) {
        Some(size_value)
    } else {
        None
    }
}

/// Mapping pairs for every distinct value of `column` that `lookup` knows.
/// Matching ignores case and surrounding whitespace.
fn keyword_mapping(column: &Column, lookup: Lookup) -> Vec<(Cell, Cell)> {
    let mut seen: HashSet<CellKey> = HashSet::new();
    let mut mapping = Vec::new();
    for cell in column.cells() {
        let Some(text) = cell.as_str() else {
            continue;
        };
        if !seen.insert(cell.key()) {
            continue;
        }
        if let Some(to) = lookup(&text.trim().to_lowercase()) {
            mapping.push((cell.clone(), to));
        }
    }
    mapping
}

fn textual_columns_matching(table: &Table, keywords: &[&str]) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter(|c| c.column_type().is_textual() && name_contains_any(c.name(), keywords))
        .map(|c| c.name().to_string())
        .collect()
}

fn is_zero_one(column: &Column) -> bool {
    let values = column.numeric_values();
    values.iter().any(|v| *v == 0.0)
        && values.iter().any(|v| *v == 1.0)
        && values.iter().all(|v| *v == 0.0 || *v == 1.0)
}

/// Columns a step touched; logged as the step's summary.
type Touched = Vec<String>;

impl FeatureEngine {
    /// Engineer features without caller-supplied operations.
    ///
    /// Meant for the output of `clean`, where column types are already settled.
    pub fn auto_transform(&self, table: &Table) -> TransformOutput {
        info!(
            "Automatic feature engineering on {} rows x {} columns",
            table.height(),
            table.width()
        );
        let mut log = TransformationLog::new();
        let mut current = table.clone();

        current = self.run_auto_step("auto-derive", current, &mut log, Self::derive_features);
        current =
            self.run_auto_step("auto-map-values", current, &mut log, Self::map_keyword_values);
        current =
            self.run_auto_step("auto-merge", current, &mut log, Self::merge_related_columns);
        current = self.run_auto_step(
            "auto-convert-types",
            current,
            &mut log,
            Self::convert_detected_types,
        );
        current = self.run_auto_step("auto-normalize", current, &mut log, Self::add_z_scores);

        info!(
            "Automatic feature engineering finished: {} -> {} columns",
            table.width(),
            current.width()
        );
        TransformOutput {
            table: current,
            log,
        }
    }

    fn run_auto_step<F>(
        &self,
        name: &str,
        table: Table,
        log: &mut TransformationLog,
        step: F,
    ) -> Table
    where
        F: FnOnce(&Self, &Table) -> Result<(Table, Touched)>,
    {
        match step(self, &table) {
            Ok((next, touched)) => {
                let summary = if touched.is_empty() {
                    "nothing to do".to_string()
                } else {
                    format!("{} columns: {}", touched.len(), touched.join(", "))
                };
                let record = ActionRecord::success(name, summary).with_values(touched.len());
                debug!("{}", record);
                log.push(record);
                next
            }
            Err(e) => {
                warn!("Automatic step '{}' failed: {}", name, e);
                log.push(ActionRecord::failure(name, e.to_string()));
                table
            }
        }
    }

    fn derive_features(&self, table: &Table) -> Result<(Table, Touched)> {
        let mut ops = Vec::new();
        let mut numeric = Vec::new();
        for column in table.columns() {
            let name = column.name().to_string();
            match column.column_type() {
                ColumnType::DateTime => ops.push(FeatureOp::DateParts { column: name }),
                ColumnType::Numeric => numeric.push(name),
                t if t.is_textual() => ops.push(FeatureOp::TextStats { column: name }),
                _ => {}
            }
        }
        if numeric.len() >= 2 {
            ops.push(FeatureOp::RowAggregates { columns: numeric });
        }

        let mut output = table.clone();
        for op in &ops {
            output = self.apply(&output, op)?;
        }
        let touched = output.columns()[table.width()..]
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        Ok((output, touched))
    }

    fn map_keyword_values(&self, table: &Table) -> Result<(Table, Touched)> {
        let mut output = table.clone();
        let mut touched = Vec::new();
        for column in table.columns().iter().filter(|c| c.column_type().is_textual()) {
            let Some(lookup) = lookup_for(column.name()) else {
                continue;
            };
            let mapping = keyword_mapping(column, lookup);
            if mapping.is_empty() {
                continue;
            }
            output = self.map_values(&output, column.name(), &mapping)?;
            touched.push(column.name().to_string());
        }
        Ok((output, touched))
    }

    fn merge_related_columns(&self, table: &Table) -> Result<(Table, Touched)> {
        let mut output = table.clone();
        let mut touched = Vec::new();

        let names = textual_columns_matching(table, &NAME_KEYWORDS);
        if names.len() >= 2 {
            output = self.merge_columns(&output, &names, "full_name", " ")?;
            touched.push("full_name".to_string());
        }

        let address = textual_columns_matching(table, &ADDRESS_KEYWORDS);
        if address.len() >= 2 {
            output = self.merge_columns(&output, &address, "full_address", ", ")?;
            touched.push("full_address".to_string());
        }

        for email in textual_columns_matching(table, &EMAIL_KEYWORDS) {
            let domain = format!("{}_domain", email);
            if email.ends_with("_domain") || table.column(&domain).is_some() {
                continue;
            }
            output = self.apply(&output, &FeatureOp::EmailDomain { column: email })?;
            touched.push(domain);
        }

        Ok((output, touched))
    }

    fn convert_detected_types(&self, table: &Table) -> Result<(Table, Touched)> {
        let height = table.height();
        if height == 0 {
            return Ok((table.clone(), Vec::new()));
        }

        let to_numeric: Vec<(String, ColumnType)> = table
            .columns()
            .iter()
            .filter(|c| c.column_type().is_textual())
            .filter(|c| {
                let parsed = c
                    .cells()
                    .iter()
                    .filter(|cell| cell.as_str().and_then(parse_number).is_some())
                    .count();
                parsed as f64 / height as f64 > NUMERIC_SHARE
            })
            .map(|c| (c.name().to_string(), ColumnType::Numeric))
            .collect();
        let output = self.convert_types(table, &to_numeric)?;

        let to_boolean: Vec<(String, ColumnType)> = output
            .columns()
            .iter()
            .filter(|c| c.column_type() == ColumnType::Numeric && is_zero_one(c))
            .map(|c| (c.name().to_string(), ColumnType::Boolean))
            .collect();
        let output = self.convert_types(&output, &to_boolean)?;

        let touched = to_numeric
            .into_iter()
            .chain(to_boolean)
            .map(|(name, target)| format!("{} -> {}", name, target))
            .collect();
        Ok((output, touched))
    }

    fn add_z_scores(&self, table: &Table) -> Result<(Table, Touched)> {
        let mut added = Vec::new();
        for column in table
            .columns()
            .iter()
            .filter(|c| c.column_type() == ColumnType::Numeric)
        {
            let name = column.name();
            if NORMALIZE_SKIP_SUFFIXES.iter().any(|s| name.ends_with(s)) {
                continue;
            }
            if !sample_std(&column.numeric_values()).is_some_and(|std| std > 0.0) {
                continue;
            }
            let scaled = normalize(column, NormalizeMethod::ZScore)?;
            added.push(scaled.renamed(format!("{}_normalized", name)));
        }

        let touched = added.iter().map(|c| c.name().to_string()).collect();
        Ok((with_columns(table, added)?, touched))
    }
}
