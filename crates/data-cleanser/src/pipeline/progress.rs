//! Progress reporting for the cleaning pipeline.
//!
//! The pipeline reports once at the start of each stage and once on
//! completion. There is no cancellation: callers that need to bound run time
//! must limit the input before calling `clean`.
//!
//! # Example
//!
//! ```rust,ignore
//! use data_cleanser::CleaningPipeline;
//!
//! let output = CleaningPipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(&table);
//! ```

use serde::{Deserialize, Serialize};

/// Stages of the cleaning pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningStage {
    /// Column name normalization and type inference
    Preprocess,
    /// Dropping rows with no values at all
    RemoveEmptyRows,
    /// Filling or dropping nulls
    MissingData,
    /// Removing duplicate rows
    Dedupe,
    /// Text, email and phone standardization
    StandardizeFormats,
    /// Statistical outlier detection
    DetectOutliers,
    /// Logical consistency rules
    CheckConsistency,
    /// Pipeline finished
    Complete,
}

impl CleaningStage {
    /// Every runnable stage, in order.
    pub const ALL: [CleaningStage; 7] = [
        Self::Preprocess,
        Self::RemoveEmptyRows,
        Self::MissingData,
        Self::Dedupe,
        Self::StandardizeFormats,
        Self::DetectOutliers,
        Self::CheckConsistency,
    ];

    /// Name used in the action log.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Preprocess => "preprocess",
            Self::RemoveEmptyRows => "remove-empty-rows",
            Self::MissingData => "missing-data",
            Self::Dedupe => "dedupe",
            Self::StandardizeFormats => "standardize-formats",
            Self::DetectOutliers => "detect-outliers",
            Self::CheckConsistency => "check-consistency",
            Self::Complete => "complete",
        }
    }

    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Preprocess => "Preprocessing",
            Self::RemoveEmptyRows => "Removing Empty Rows",
            Self::MissingData => "Resolving Missing Data",
            Self::Dedupe => "Removing Duplicates",
            Self::StandardizeFormats => "Standardizing Formats",
            Self::DetectOutliers => "Detecting Outliers",
            Self::CheckConsistency => "Checking Consistency",
            Self::Complete => "Complete",
        }
    }

    /// Cumulative progress (0.0 - 1.0) at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Complete => 1.0,
            stage => {
                let index = Self::ALL.iter().position(|s| s == stage).unwrap_or(0);
                index as f32 / Self::ALL.len() as f32
            }
        }
    }
}

/// A single progress notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: CleaningStage,
    /// Overall progress (0.0 - 1.0)
    pub progress: f32,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(stage: CleaningStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: stage.base_progress().clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(CleaningStage::Complete, message)
    }
}

/// Receives progress updates while the pipeline runs.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_stage_progress_is_monotonic() {
        let mut last = -1.0;
        for stage in CleaningStage::ALL {
            assert!(stage.base_progress() > last);
            last = stage.base_progress();
        }
        assert_eq!(CleaningStage::Complete.base_progress(), 1.0);
    }

    #[test]
    fn test_closure_reporter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ClosureProgressReporter::new(move |update: ProgressUpdate| {
            sink.lock().unwrap().push(update.stage);
        });

        reporter.report(ProgressUpdate::new(CleaningStage::Dedupe, "deduplicating"));
        reporter.report(ProgressUpdate::complete("done"));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![CleaningStage::Dedupe, CleaningStage::Complete]
        );
    }

    #[test]
    fn test_stage_names_serialize() {
        let json =
            serde_json::to_string(&CleaningStage::DetectOutliers).expect("Should serialize");
        assert_eq!(json, "\"detect_outliers\"");
        assert_eq!(CleaningStage::DetectOutliers.name(), "detect-outliers");
    }
}
