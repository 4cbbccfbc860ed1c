//! Data quality scoring module.
//!
//! This module scores a table along five dimensions (completeness,
//! uniqueness, consistency, accuracy, validity) and compares the scores of an
//! original and a cleaned table.

mod scorer;
mod validator;

pub use scorer::{
    BasicInfo, Completeness, DimensionScore, QualityAssessment, QualityScorer, Uniqueness,
};
pub use validator::{
    Correlation, DistributionStats, QualityComparison, ValidationReport, compare,
};
