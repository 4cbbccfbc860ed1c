//! Cleaning pipeline orchestration.
//!
//! This module provides the [`CleaningPipeline`] and its builder. Stages run in
//! a fixed order, each consuming the previous stage's table:
//!
//! preprocess → remove-empty-rows → missing-data → dedupe →
//! standardize-formats → detect-outliers → check-consistency
//!
//! Standardization is followed by a second duplicate pass with the same key
//! and policy, so rows that only differ by case or whitespace do not survive
//! into the output.
//!
//! A stage that fails is logged as a failure record and its input table is
//! passed on unchanged. Only configuration errors are fatal, and those are
//! caught when the pipeline is built.

use crate::cleaner::{
    ColumnNormalizer, ConsistencyChecker, Deduplicator, FormatStandardizer, normalize_name,
    remove_empty_rows,
};
use crate::config::{CleaningConfig, ConfigValidationError};
use crate::error::{CleaningError, Result};
use crate::imputers::MissingDataResolver;
use crate::pipeline::outliers::OutlierDetector;
use crate::pipeline::progress::{
    CleaningStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
use crate::profiler::TypeInferencer;
use crate::table::Table;
use crate::types::{ActionRecord, CleanOutput, CleaningLog, StageOutput, ValidationIssue};
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The cleaning pipeline.
///
/// Use [`CleaningPipeline::builder()`] to create one.
///
/// # Example
///
/// ```rust,ignore
/// use data_cleanser::{CleaningConfig, CleaningPipeline, KeepPolicy};
///
/// let pipeline = CleaningPipeline::builder()
///     .config(CleaningConfig::builder().duplicate_policy(KeepPolicy::Last).build()?)
///     .on_progress(|update| println!("{}", update.message))
///     .build()?;
///
/// let output = pipeline.run(&table);
/// for line in output.log.summary_lines() {
///     println!("{}", line);
/// }
/// ```
pub struct CleaningPipeline {
    config: CleaningConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    reference_time: Option<NaiveDateTime>,
}

// Ensure CleaningPipeline is Send (can be moved to a worker thread)
static_assertions::assert_impl_all!(CleaningPipeline: Send);

impl CleaningPipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> CleaningPipelineBuilder {
        CleaningPipelineBuilder::default()
    }

    pub fn config(&self) -> &CleaningConfig {
        &self.config
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    /// Clean a table.
    ///
    /// The input is copied once; the caller's table is never modified. Always
    /// returns a table, together with the log of what each stage did.
    pub fn run(&self, table: &Table) -> CleanOutput {
        let start_time = Instant::now();
        info!(
            "Starting cleaning pipeline on {} rows x {} columns",
            table.height(),
            table.width()
        );

        let mut log = CleaningLog::new();
        let mut issues: Vec<ValidationIssue> = Vec::new();
        let mut current = table.clone();

        for stage in CleaningStage::ALL {
            self.report_progress(ProgressUpdate::new(
                stage,
                format!("{}...", stage.display_name()),
            ));
            current = self.run_stage(stage, current, &mut log, &mut issues);
        }

        let elapsed = start_time.elapsed();
        info!(
            "Cleaning finished in {:.2?}: {} rows x {} columns, {} log entries, {} failures",
            elapsed,
            current.height(),
            current.width(),
            log.len(),
            log.failures().count()
        );
        self.report_progress(ProgressUpdate::complete(format!(
            "Cleaning complete: {} rows, {} columns",
            current.height(),
            current.width()
        )));

        CleanOutput {
            table: current,
            log,
            issues,
        }
    }

    /// Run one stage in isolation. On error the input table is returned as-is.
    fn run_stage(
        &self,
        stage: CleaningStage,
        table: Table,
        log: &mut CleaningLog,
        issues: &mut Vec<ValidationIssue>,
    ) -> Table {
        debug!("Running stage '{}'", stage.name());
        match self.execute(stage, &table) {
            Ok(output) => {
                log.extend(output.records);
                issues.extend(output.issues);
                output.table
            }
            Err(e) => {
                warn!("Stage '{}' failed: {}", stage.name(), e);
                let error = CleaningError::StageFailed {
                    stage: stage.name().to_string(),
                    reason: e.to_string(),
                };
                log.push(ActionRecord::failure(stage.name(), error.to_string()));
                table
            }
        }
    }

    fn deduplicator(&self) -> Deduplicator {
        let subset = self
            .config
            .duplicate_subset
            .as_ref()
            .map(|names| names.iter().map(|n| normalize_name(n)).collect());
        Deduplicator::new(subset, self.config.duplicate_policy)
    }

    fn execute(&self, stage: CleaningStage, table: &Table) -> Result<StageOutput> {
        let config = &self.config;
        match stage {
            CleaningStage::Preprocess => {
                let normalized = ColumnNormalizer::apply(table, stage.name());
                let typed = TypeInferencer::new(config.sample_size, &config.date_format)
                    .apply(&normalized.table);
                let mut records = normalized.records;
                records.extend(typed.records);
                Ok(StageOutput {
                    table: typed.table,
                    records,
                    issues: Vec::new(),
                })
            }
            CleaningStage::RemoveEmptyRows => Ok(remove_empty_rows(table)),
            CleaningStage::MissingData => {
                Ok(MissingDataResolver::new(config.missing_strategy.clone()).apply(table))
            }
            CleaningStage::Dedupe => self.deduplicator().apply(table),
            CleaningStage::StandardizeFormats => {
                let mut output =
                    FormatStandardizer::new(config.text_options, config.sample_size).apply(table);
                // Rows can become equal once casing and whitespace are unified
                match self.deduplicator().apply(&output.table) {
                    Ok(deduped) if deduped.table.height() < output.table.height() => {
                        output.table = deduped.table;
                        output.records.extend(deduped.records);
                    }
                    Ok(_) => {}
                    Err(e) => debug!("Skipping post-standardization dedupe: {}", e),
                }
                Ok(output)
            }
            CleaningStage::DetectOutliers => Ok(OutlierDetector::new(
                config.outlier_method,
                config.outlier_threshold,
                config.outlier_action,
            )
            .apply(table)),
            CleaningStage::CheckConsistency => {
                let checker = match self.reference_time {
                    Some(now) => ConsistencyChecker::with_reference_time(now),
                    None => ConsistencyChecker::new(),
                };
                Ok(checker.apply(table))
            }
            CleaningStage::Complete => Ok(StageOutput::new(table.clone())),
        }
    }
}

/// Builder for creating a [`CleaningPipeline`] instance.
///
/// Use [`CleaningPipeline::builder()`] to get started.
#[derive(Default)]
pub struct CleaningPipelineBuilder {
    config: Option<CleaningConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    reference_time: Option<NaiveDateTime>,
}

static_assertions::assert_impl_all!(CleaningPipelineBuilder: Send);

impl CleaningPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: CleaningConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Pin "now" for the future-date rule. Defaults to the local clock.
    pub fn reference_time(mut self, now: NaiveDateTime) -> Self {
        self.reference_time = Some(now);
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<CleaningPipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(CleaningPipeline {
            config,
            progress_reporter: self.progress_reporter,
            reference_time: self.reference_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KeepPolicy, NumericFill};
    use crate::table::{Cell, Column, ColumnType};
    use std::sync::Mutex;

    fn raw_table() -> Table {
        Table::new(vec![
            Column::from_values("ID", vec!["1", "2", "2", "3"]),
            Column::from_values("Full Name", vec![" Ann ", "Bob", "Bob", "Cy"]),
            Column::new(
                "Score",
                vec![
                    Cell::from("10"),
                    Cell::from("20"),
                    Cell::from("20"),
                    Cell::Null,
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_pipeline_builder_default() {
        let pipeline = CleaningPipeline::builder().build().unwrap();
        assert_eq!(pipeline.config(), &CleaningConfig::default());
    }

    #[test]
    fn test_pipeline_builder_rejects_invalid_config() {
        let mut config = CleaningConfig::default();
        config.missing_strategy.numeric = NumericFill::Custom;
        let result = CleaningPipeline::builder().config(config).build();
        assert!(matches!(
            result.err(),
            Some(ConfigValidationError::MissingCustomValues)
        ));
    }

    #[test]
    fn test_stages_run_in_order() {
        let pipeline = CleaningPipeline::builder().build().unwrap();
        let output = pipeline.run(&raw_table());

        let mut stages: Vec<&str> = Vec::new();
        for record in output.log.records() {
            if stages.last() != Some(&record.stage.as_str()) {
                stages.push(record.stage.as_str());
            }
        }
        let expected: Vec<&str> = CleaningStage::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(stages, expected);
    }

    #[test]
    fn test_pipeline_cleans_and_keeps_input() {
        let input = raw_table();
        let output = CleaningPipeline::builder().build().unwrap().run(&input);

        assert_eq!(input, raw_table());
        assert_eq!(output.table.column_names(), vec!["id", "full_name", "score"]);
        assert_eq!(output.table.height(), 3);
        let score = output.table.column("score").unwrap();
        assert_eq!(score.column_type(), ColumnType::Numeric);
        assert_eq!(score.null_count(), 0);
        assert_eq!(
            output.table.column("full_name").unwrap().get(0),
            Some(&Cell::from("Ann"))
        );
    }

    #[test]
    fn test_failed_stage_is_isolated() {
        let config = CleaningConfig::builder()
            .duplicate_subset(["no_such_column"])
            .build()
            .unwrap();
        let output = CleaningPipeline::builder()
            .config(config)
            .build()
            .unwrap()
            .run(&raw_table());

        let failures: Vec<&ActionRecord> = output.log.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].stage, "dedupe");
        // Duplicate row survives, later stages still ran
        assert_eq!(output.table.height(), 4);
        assert_eq!(output.log.for_stage("check-consistency").count(), 1);
    }

    #[test]
    fn test_dedupe_subset_names_are_normalized() {
        let config = CleaningConfig::builder()
            .duplicate_subset(["Full Name"])
            .duplicate_policy(KeepPolicy::First)
            .build()
            .unwrap();
        let output = CleaningPipeline::builder()
            .config(config)
            .build()
            .unwrap()
            .run(&raw_table());
        assert_eq!(output.log.failures().count(), 0);
        assert_eq!(output.table.height(), 3);
    }

    #[test]
    fn test_progress_reported_per_stage() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        let pipeline = CleaningPipeline::builder()
            .on_progress(move |update| sink.lock().unwrap().push(update.stage))
            .build()
            .unwrap();

        pipeline.run(&raw_table());

        let seen = stages.lock().unwrap();
        assert_eq!(seen.len(), CleaningStage::ALL.len() + 1);
        assert_eq!(seen.last(), Some(&CleaningStage::Complete));
    }

    #[test]
    fn test_rows_equal_after_standardization_are_deduplicated() {
        let table = Table::new(vec![
            Column::from_values("id", vec![1.0, 1.0]),
            Column::from_values("email", vec!["A@x.com", "a@x.com "]),
        ])
        .unwrap();
        let pipeline = CleaningPipeline::builder().build().unwrap();

        let first = pipeline.run(&table);
        assert_eq!(first.table.height(), 1);
        assert_eq!(first.table.column("email").unwrap().get(0), Some(&Cell::from("a@x.com")));

        let second = pipeline.run(&first.table);
        assert_eq!(second.table, first.table);
    }
}
