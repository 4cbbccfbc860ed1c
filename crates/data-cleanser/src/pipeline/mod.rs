//! Pipeline module.
//!
//! This module provides the cleaning pipeline and its outlier and progress
//! components.

mod builder;
pub mod outliers;
pub mod progress;

pub use builder::{CleaningPipeline, CleaningPipelineBuilder};
pub use outliers::{OutlierBounds, OutlierDetector, iqr_bounds};
pub use progress::{ClosureProgressReporter, CleaningStage, ProgressReporter, ProgressUpdate};
