//! Configuration types for the cleaning pipeline.
//!
//! [`CleaningConfig`] enumerates every option `clean` understands. Build it
//! with [`CleaningConfig::builder()`] or deserialize it from JSON; missing
//! fields take their defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of leading non-null values inspected by the sample-based heuristics.
pub const DEFAULT_SAMPLE_SIZE: usize = 10;

/// Default z-score cut-off.
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;

/// Fence multiplier for the IQR rule.
pub const IQR_MULTIPLIER: f64 = 1.5;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

pub const DEFAULT_PLACEHOLDER: &str = "Unknown";

/// Fill policy for numeric columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NumericFill {
    /// Arithmetic mean of the non-null values
    #[default]
    Mean,
    /// Median of the non-null values
    Median,
    /// Constant 0.0
    Zero,
    /// Carry the previous value forward
    ForwardFill,
    /// Carry the next value backward
    BackwardFill,
    /// Linear interpolation between neighbours
    Interpolate,
    /// Drop rows with a null in the column
    RemoveRow,
    /// Per-column value from `MissingStrategy::custom_values`
    Custom,
}

/// Fill policy for text and categorical columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TextFill {
    /// Most frequent value, ties go to the first one seen
    #[default]
    Mode,
    ForwardFill,
    BackwardFill,
    /// A literal placeholder value
    Placeholder(String),
    RemoveRow,
}

/// Fill policy for datetime columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DateTimeFill {
    /// Median timestamp of the non-null values
    #[default]
    Median,
    RemoveRow,
}

/// Per-type missing value policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MissingStrategy {
    pub numeric: NumericFill,
    pub text: TextFill,
    pub datetime: DateTimeFill,
    /// Values used by [`NumericFill::Custom`], keyed by column name.
    pub custom_values: BTreeMap<String, f64>,
}

/// Which member of a duplicate group survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum KeepPolicy {
    /// Keep the first occurrence
    #[default]
    First,
    /// Keep the last occurrence
    Last,
    /// Drop every row that belongs to a duplicate group
    None,
}

/// Statistical rule for flagging outliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutlierMethod {
    /// Outside [Q1 - 1.5*IQR, Q3 + 1.5*IQR]
    #[default]
    Iqr,
    /// |value - mean| / std above the threshold
    ZScore,
}

/// What happens to flagged outliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutlierAction {
    /// Record issues only
    #[default]
    Flag,
    /// Drop rows holding an outlier
    Remove,
    /// Clip to the computed bound
    Cap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CaseStyle {
    #[default]
    Preserve,
    Lower,
    Upper,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SpecialChars {
    #[default]
    Keep,
    /// Drop everything except letters, digits, whitespace and `.,@-_'`
    Remove,
}

/// Options applied to plain text columns by the format standardizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOptions {
    pub trim: bool,
    pub case: CaseStyle,
    pub special_chars: SpecialChars,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            trim: true,
            case: CaseStyle::default(),
            special_chars: SpecialChars::default(),
        }
    }
}

/// Configuration for [`crate::pipeline::CleaningPipeline`].
///
/// # Example
///
/// ```rust,ignore
/// use data_cleanser::config::{CleaningConfig, KeepPolicy, OutlierMethod};
///
/// let config = CleaningConfig::builder()
///     .duplicate_policy(KeepPolicy::Last)
///     .outlier_method(OutlierMethod::ZScore)
///     .outlier_threshold(2.5)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Per-type missing value policies.
    pub missing_strategy: MissingStrategy,

    /// Which duplicate rows survive.
    /// Default: First
    pub duplicate_policy: KeepPolicy,

    /// Columns forming the duplicate key. `None` means all columns.
    pub duplicate_subset: Option<Vec<String>>,

    /// Default: Iqr
    pub outlier_method: OutlierMethod,

    /// Z-score cut-off, ignored by the IQR rule.
    /// Default: 3.0
    pub outlier_threshold: f64,

    /// Default: Flag
    pub outlier_action: OutlierAction,

    pub text_options: TextOptions,

    /// chrono format tried first when parsing dates and used when rendering them.
    /// Default: "%Y-%m-%d"
    pub date_format: String,

    /// Leading non-null values inspected when guessing column types and formats.
    /// Default: 10
    pub sample_size: usize,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            missing_strategy: MissingStrategy::default(),
            duplicate_policy: KeepPolicy::default(),
            duplicate_subset: None,
            outlier_method: OutlierMethod::default(),
            outlier_threshold: DEFAULT_Z_THRESHOLD,
            outlier_action: OutlierAction::default(),
            text_options: TextOptions::default(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

impl CleaningConfig {
    pub fn builder() -> CleaningConfigBuilder {
        CleaningConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.outlier_threshold.is_finite() || self.outlier_threshold <= 0.0 {
            return Err(ConfigValidationError::InvalidThreshold(self.outlier_threshold));
        }

        if self.sample_size == 0 {
            return Err(ConfigValidationError::InvalidSampleSize);
        }

        if self.date_format.trim().is_empty() {
            return Err(ConfigValidationError::EmptyDateFormat);
        }

        if self.missing_strategy.numeric == NumericFill::Custom
            && self.missing_strategy.custom_values.is_empty()
        {
            return Err(ConfigValidationError::MissingCustomValues);
        }

        if let Some(subset) = &self.duplicate_subset
            && subset.is_empty()
        {
            return Err(ConfigValidationError::EmptyDuplicateSubset);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid outlier threshold: {0} (must be a positive number)")]
    InvalidThreshold(f64),

    #[error("Invalid sample size: must be at least 1")]
    InvalidSampleSize,

    #[error("Date format must not be empty")]
    EmptyDateFormat,

    #[error("Custom numeric fill requested but no custom values were supplied")]
    MissingCustomValues,

    #[error("Duplicate subset must name at least one column")]
    EmptyDuplicateSubset,
}

impl From<ConfigValidationError> for crate::error::CleaningError {
    fn from(err: ConfigValidationError) -> Self {
        crate::error::CleaningError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`CleaningConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct CleaningConfigBuilder {
    numeric_fill: Option<NumericFill>,
    text_fill: Option<TextFill>,
    datetime_fill: Option<DateTimeFill>,
    custom_values: BTreeMap<String, f64>,
    duplicate_policy: Option<KeepPolicy>,
    duplicate_subset: Option<Vec<String>>,
    outlier_method: Option<OutlierMethod>,
    outlier_threshold: Option<f64>,
    outlier_action: Option<OutlierAction>,
    text_options: Option<TextOptions>,
    date_format: Option<String>,
    sample_size: Option<usize>,
}

impl CleaningConfigBuilder {
    pub fn numeric_fill(mut self, fill: NumericFill) -> Self {
        self.numeric_fill = Some(fill);
        self
    }

    pub fn text_fill(mut self, fill: TextFill) -> Self {
        self.text_fill = Some(fill);
        self
    }

    pub fn datetime_fill(mut self, fill: DateTimeFill) -> Self {
        self.datetime_fill = Some(fill);
        self
    }

    /// Register the value [`NumericFill::Custom`] uses for `column`.
    pub fn custom_value(mut self, column: impl Into<String>, value: f64) -> Self {
        self.custom_values.insert(column.into(), value);
        self
    }

    pub fn duplicate_policy(mut self, policy: KeepPolicy) -> Self {
        self.duplicate_policy = Some(policy);
        self
    }

    /// Restrict the duplicate key to these columns.
    pub fn duplicate_subset<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.duplicate_subset = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn outlier_method(mut self, method: OutlierMethod) -> Self {
        self.outlier_method = Some(method);
        self
    }

    pub fn outlier_threshold(mut self, threshold: f64) -> Self {
        self.outlier_threshold = Some(threshold);
        self
    }

    pub fn outlier_action(mut self, action: OutlierAction) -> Self {
        self.outlier_action = Some(action);
        self
    }

    pub fn text_options(mut self, options: TextOptions) -> Self {
        self.text_options = Some(options);
        self
    }

    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    pub fn sample_size(mut self, size: usize) -> Self {
        self.sample_size = Some(size);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `CleaningConfig` or an error if validation fails.
    pub fn build(self) -> Result<CleaningConfig, ConfigValidationError> {
        let config = CleaningConfig {
            missing_strategy: MissingStrategy {
                numeric: self.numeric_fill.unwrap_or_default(),
                text: self.text_fill.unwrap_or_default(),
                datetime: self.datetime_fill.unwrap_or_default(),
                custom_values: self.custom_values,
            },
            duplicate_policy: self.duplicate_policy.unwrap_or_default(),
            duplicate_subset: self.duplicate_subset,
            outlier_method: self.outlier_method.unwrap_or_default(),
            outlier_threshold: self.outlier_threshold.unwrap_or(DEFAULT_Z_THRESHOLD),
            outlier_action: self.outlier_action.unwrap_or_default(),
            text_options: self.text_options.unwrap_or_default(),
            date_format: self
                .date_format
                .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string()),
            sample_size: self.sample_size.unwrap_or(DEFAULT_SAMPLE_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}
