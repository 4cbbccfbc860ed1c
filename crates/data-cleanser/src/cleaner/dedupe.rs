//! Duplicate row removal.

use crate::config::KeepPolicy;
use crate::error::{CleaningError, Result};
use crate::table::{CellKey, Table};
use crate::types::{ActionRecord, StageOutput};
use std::collections::HashMap;
use tracing::debug;

pub(crate) const STAGE: &str = "dedupe";

/// Removes rows that are equal on a key made of some or all columns.
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    subset: Option<Vec<String>>,
    policy: KeepPolicy,
}

impl Deduplicator {
    pub fn new(subset: Option<Vec<String>>, policy: KeepPolicy) -> Self {
        Self { subset, policy }
    }

    /// Indices of the key columns. Fails if a subset column does not exist.
    fn key_columns(&self, table: &Table) -> Result<Vec<usize>> {
        match &self.subset {
            Some(names) => names
                .iter()
                .map(|name| {
                    table
                        .column_index(name)
                        .ok_or_else(|| CleaningError::ColumnNotFound(name.clone()))
                })
                .collect(),
            None => Ok((0..table.width()).collect()),
        }
    }

    /// Row mask of survivors under the configured policy.
    pub fn keep_mask(&self, table: &Table) -> Result<Vec<bool>> {
        let key_columns = self.key_columns(table)?;
        let keys: Vec<Vec<CellKey>> = (0..table.height())
            .map(|i| table.row_key(i, &key_columns))
            .collect();

        let mut keep = vec![false; keys.len()];
        match self.policy {
            KeepPolicy::First => {
                let mut seen = std::collections::HashSet::new();
                for (i, key) in keys.iter().enumerate() {
                    keep[i] = seen.insert(key);
                }
            }
            KeepPolicy::Last => {
                let mut seen = std::collections::HashSet::new();
                for (i, key) in keys.iter().enumerate().rev() {
                    keep[i] = seen.insert(key);
                }
            }
            KeepPolicy::None => {
                let mut counts: HashMap<&Vec<CellKey>, usize> = HashMap::new();
                for key in &keys {
                    *counts.entry(key).or_insert(0) += 1;
                }
                for (i, key) in keys.iter().enumerate() {
                    keep[i] = counts.get(key).copied().unwrap_or(0) == 1;
                }
            }
        }
        Ok(keep)
    }

    pub fn apply(&self, table: &Table) -> Result<StageOutput> {
        let keep = self.keep_mask(table)?;
        let removed = keep.iter().filter(|k| !**k).count();
        debug!("Removed {} duplicate rows ({:?} policy)", removed, self.policy);

        let key_desc = match &self.subset {
            Some(names) => names.join(", "),
            None => "all columns".to_string(),
        };
        let summary = if removed > 0 {
            let pct = removed as f64 / table.height() as f64 * 100.0;
            format!(
                "removed {} duplicate rows ({:.1}%) keyed on {}",
                removed, pct, key_desc
            )
        } else {
            format!("no duplicate rows keyed on {}", key_desc)
        };

        let output = if removed > 0 {
            table.filter_rows(&keep)
        } else {
            table.clone()
        };
        Ok(StageOutput::new(output)
            .with_record(ActionRecord::success(STAGE, summary).with_rows(removed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Cell, Column};

    fn orders() -> Table {
        Table::new(vec![
            Column::from_values("id", vec![1.0, 2.0, 2.0, 3.0]),
            Column::from_values("name", vec!["A", "B", "B", "C"]),
            Column::from_values("value", vec![10.0, 20.0, 25.0, 30.0]),
        ])
        .unwrap()
    }

    fn key() -> Option<Vec<String>> {
        Some(vec!["id".to_string(), "name".to_string()])
    }

    #[test]
    fn test_keep_first() {
        let output = Deduplicator::new(key(), KeepPolicy::First)
            .apply(&orders())
            .unwrap();
        let values = output.table.column("value").unwrap().numeric_values();
        assert_eq!(values, vec![10.0, 20.0, 30.0]);
        assert_eq!(output.records[0].rows_affected, 1);
    }

    #[test]
    fn test_keep_last() {
        let output = Deduplicator::new(key(), KeepPolicy::Last)
            .apply(&orders())
            .unwrap();
        let values = output.table.column("value").unwrap().numeric_values();
        assert_eq!(values, vec![10.0, 25.0, 30.0]);
    }

    #[test]
    fn test_keep_none_drops_whole_group() {
        let output = Deduplicator::new(key(), KeepPolicy::None)
            .apply(&orders())
            .unwrap();
        let ids = output.table.column("id").unwrap().numeric_values();
        assert_eq!(ids, vec![1.0, 3.0]);
        assert_eq!(output.records[0].rows_affected, 2);
    }

    #[test]
    fn test_all_columns_by_default() {
        let output = Deduplicator::default().apply(&orders()).unwrap();
        assert_eq!(output.table.height(), 4);
    }

    #[test]
    fn test_nulls_compare_equal() {
        let table = Table::new(vec![
            Column::new("a", vec![Cell::Null, Cell::Null, Cell::from(1.0)]),
            Column::new("b", vec![Cell::from("x"), Cell::from("x"), Cell::from("x")]),
        ])
        .unwrap();
        let output = Deduplicator::default().apply(&table).unwrap();
        assert_eq!(output.table.height(), 2);
    }

    #[test]
    fn test_unknown_subset_column() {
        let dedup = Deduplicator::new(Some(vec!["missing".to_string()]), KeepPolicy::First);
        let err = dedup.apply(&orders()).unwrap_err();
        assert!(matches!(err, CleaningError::ColumnNotFound(name) if name == "missing"));
    }
}
