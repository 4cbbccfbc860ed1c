//! Column name normalization.

use crate::table::Table;
use crate::types::{ActionRecord, StageOutput};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::warn;

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w]").expect("Invalid regex: non-word character"));

/// Canonical form of a column name: trimmed, non-word characters replaced
/// by `_`, lower-cased.
pub fn normalize_name(name: &str) -> String {
    NON_WORD
        .replace_all(name.trim(), "_")
        .to_lowercase()
}

/// Rewrites every column name to its canonical form.
///
/// Names that collide after normalization are kept as-is (the table then
/// holds two columns with the same name); a warning is logged.
pub struct ColumnNormalizer;

impl ColumnNormalizer {
    pub fn apply(table: &Table, stage: &str) -> StageOutput {
        let renamed = table
            .column_names()
            .iter()
            .filter(|name| normalize_name(name) != **name)
            .count();

        let normalized = table.rename_columns(normalize_name);

        let mut seen: HashMap<&str, usize> = HashMap::new();
        for name in normalized.column_names() {
            *seen.entry(name).or_insert(0) += 1;
        }
        let mut collisions: Vec<&str> = seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name)
            .collect();
        collisions.sort_unstable();
        for name in &collisions {
            warn!("Several columns normalize to '{}'", name);
        }

        let mut summary = format!("normalized {} column names", renamed);
        if !collisions.is_empty() {
            summary.push_str(&format!(", colliding names: {}", collisions.join(", ")));
        }

        let record = ActionRecord::success(stage, summary).with_values(renamed);
        StageOutput::new(normalized).with_record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  First Name "), "first_name");
        assert_eq!(normalize_name("Price ($)"), "price____");
        assert_eq!(normalize_name("E-mail"), "e_mail");
        assert_eq!(normalize_name("already_ok"), "already_ok");
    }

    #[test]
    fn test_normalizer_reports_collisions() {
        let table = Table::new(vec![
            Column::from_values("Full Name", vec!["a"]),
            Column::from_values("full-name", vec!["b"]),
        ])
        .unwrap();

        let output = ColumnNormalizer::apply(&table, "preprocess");
        assert_eq!(output.table.column_names(), vec!["full_name", "full_name"]);
        assert!(output.records[0].summary.contains("colliding names: full_name"));
        assert_eq!(output.records[0].values_affected, 2);
    }
}
