//! Column profiling.
//!
//! Classifies each column into a [`ColumnType`](crate::table::ColumnType) from
//! a sample of its values and coerces the full column to that type.

mod type_inference;

pub use type_inference::{TypeInferencer, coerce_cell, coerce_column};
