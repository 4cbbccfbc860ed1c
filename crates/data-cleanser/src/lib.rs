//! Data Cleanser Library
//!
//! Cleans tabular data and scores its quality before and after.
//!
//! # Overview
//!
//! - **Type Inference**: sample-based column classification with best-effort coercion
//! - **Missing Data**: per-type fill policies (mean, median, mode, fills, interpolation, row removal)
//! - **Deduplication**: first/last/none keep policies over a configurable key
//! - **Format Standardization**: text trimming and casing, email and phone normalization
//! - **Outliers**: IQR and z-score rules, flag/remove/cap
//! - **Consistency**: future dates, impossible ages, negative amounts
//! - **Feature Engineering**: derived columns, value maps, merge/split, scaling, binning, encoding,
//!   plus an automatic mode driven by column names and types
//! - **Quality Scoring**: completeness, uniqueness, consistency, accuracy and validity
//!
//! Every cleaning stage is isolated: if one fails, the failure is logged and
//! the pipeline carries on with the table as it was. Only an invalid
//! configuration is returned as an error.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use data_cleanser::{CleaningConfig, KeepPolicy, NumericFill, read_csv};
//!
//! let raw = read_csv("customers.csv")?;
//!
//! let config = CleaningConfig::builder()
//!     .numeric_fill(NumericFill::Median)
//!     .duplicate_subset(["customer_id"])
//!     .duplicate_policy(KeepPolicy::Last)
//!     .build()?;
//!
//! let cleaned = data_cleanser::clean(&raw, &config)?;
//! for line in cleaned.log.summary_lines() {
//!     println!("{}", line);
//! }
//!
//! let report = data_cleanser::validate(&raw, &cleaned.table);
//! println!(
//!     "Quality {} -> {}",
//!     report.comparison.score_before, report.comparison.score_after
//! );
//! ```
//!
//! # Feature Engineering
//!
//! ```rust,ignore
//! use data_cleanser::features::{EncodeMethod, FeatureOp};
//!
//! let ops = vec![
//!     FeatureOp::DateParts { column: "signup_date".into() },
//!     FeatureOp::Encode { column: "segment".into(), method: EncodeMethod::OneHot },
//! ];
//! let transformed = data_cleanser::transform(&cleaned.table, &ops)?;
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod features;
pub mod imputers;
pub mod pipeline;
pub mod profiler;
pub mod quality;
pub mod table;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::{ColumnNormalizer, ConsistencyChecker, Deduplicator, FormatStandardizer};
pub use config::{
    CaseStyle, CleaningConfig, CleaningConfigBuilder, ConfigValidationError, DateTimeFill,
    KeepPolicy, MissingStrategy, NumericFill, OutlierAction, OutlierMethod, SpecialChars, TextFill,
    TextOptions,
};
pub use error::{CleaningError, Result as CleaningResult, ResultExt};
pub use features::{FeatureEngine, FeatureFn, FeatureOp};
pub use imputers::MissingDataResolver;
pub use pipeline::{
    CleaningPipeline, CleaningPipelineBuilder, CleaningStage, ClosureProgressReporter,
    OutlierDetector, ProgressReporter, ProgressUpdate,
};
pub use profiler::TypeInferencer;
pub use quality::{QualityAssessment, QualityComparison, QualityScorer, ValidationReport};
pub use table::{Cell, Column, ColumnType, Table, read_csv, write_csv};
pub use types::{
    ActionOutcome, ActionRecord, CleanOutput, CleaningLog, Severity, TransformOutput,
    TransformationLog, ValidationIssue,
};

/// Clean `table` with `config`.
///
/// The input table is left untouched. Returns `InvalidConfig` before any stage
/// runs if the configuration is invalid; stage failures end up in the log.
pub fn clean(table: &Table, config: &CleaningConfig) -> CleaningResult<CleanOutput> {
    let pipeline = CleaningPipeline::builder().config(config.clone()).build()?;
    Ok(pipeline.run(table))
}

/// Apply feature operations in order.
pub fn transform(table: &Table, ops: &[FeatureOp]) -> CleaningResult<TransformOutput> {
    FeatureEngine::new().transform(table, ops)
}

/// Engineer features automatically from column names and types.
pub fn auto_transform(table: &Table) -> TransformOutput {
    FeatureEngine::new().auto_transform(table)
}

/// Score `original` and `cleaned` and build the comparison report.
pub fn validate(original: &Table, cleaned: &Table) -> ValidationReport {
    QualityScorer::new().validate(original, cleaned)
}

/// Score a single table.
pub fn assess(table: &Table) -> QualityAssessment {
    QualityScorer::new().assess(table)
}
