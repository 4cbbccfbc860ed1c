//! Data cleaning stages.
//!
//! This module provides the row- and value-level stages of the pipeline:
//! - Column name normalization
//! - Empty row removal
//! - Duplicate removal
//! - Text, email and phone standardization
//! - Logical consistency checks

mod consistency;
mod dedupe;
mod formats;
mod names;

pub use consistency::ConsistencyChecker;
pub use dedupe::Deduplicator;
pub use formats::{FormatStandardizer, TextKind, format_phone};
pub use names::{ColumnNormalizer, normalize_name};

use crate::table::Table;
use crate::types::{ActionRecord, StageOutput};
use tracing::debug;

pub(crate) const EMPTY_ROWS_STAGE: &str = "remove-empty-rows";

/// Drop rows in which every cell is null.
pub fn remove_empty_rows(table: &Table) -> StageOutput {
    let keep: Vec<bool> = (0..table.height()).map(|i| !table.row_is_empty(i)).collect();
    let removed = keep.iter().filter(|k| !**k).count();

    if removed == 0 {
        debug!("No empty rows found");
        return StageOutput::new(table.clone())
            .with_record(ActionRecord::success(EMPTY_ROWS_STAGE, "no empty rows found"));
    }

    debug!("Removed {} empty rows", removed);
    StageOutput::new(table.filter_rows(&keep)).with_record(
        ActionRecord::success(EMPTY_ROWS_STAGE, format!("removed {} empty rows", removed))
            .with_rows(removed),
    )
}
