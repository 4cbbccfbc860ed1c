//! CLI entry point for the data cleaning pipeline.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use data_cleanser::{
    CleanOutput, CleaningConfig, CleaningPipeline, KeepPolicy, NumericFill, OutlierAction,
    OutlierMethod, QualityAssessment, QualityScorer, Table, TextFill, ValidationReport, read_csv,
    write_csv,
};
use dotenv::dotenv;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// CLI-compatible numeric fill enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliNumericFill {
    /// Use the mean of non-null values
    Mean,
    /// Use the median of non-null values
    Median,
    /// Use zero as the fill value
    Zero,
    /// Carry the previous value forward
    Forward,
    /// Carry the next value backward
    Backward,
    /// Linear interpolation between neighbors
    Interpolate,
    /// Drop rows with missing values
    Drop,
}

impl From<CliNumericFill> for NumericFill {
    fn from(cli: CliNumericFill) -> Self {
        match cli {
            CliNumericFill::Mean => NumericFill::Mean,
            CliNumericFill::Median => NumericFill::Median,
            CliNumericFill::Zero => NumericFill::Zero,
            CliNumericFill::Forward => NumericFill::ForwardFill,
            CliNumericFill::Backward => NumericFill::BackwardFill,
            CliNumericFill::Interpolate => NumericFill::Interpolate,
            CliNumericFill::Drop => NumericFill::RemoveRow,
        }
    }
}

/// CLI-compatible text fill enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTextFill {
    /// Use the most frequent value (mode)
    Mode,
    /// Carry the previous value forward
    Forward,
    /// Carry the next value backward
    Backward,
    /// Use the placeholder given by --placeholder
    Constant,
    /// Drop rows with missing values
    Drop,
}

/// CLI-compatible duplicate policy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliKeepPolicy {
    /// Keep the first row of each duplicate group
    First,
    /// Keep the last row of each duplicate group
    Last,
    /// Drop every row of each duplicate group
    None,
}

impl From<CliKeepPolicy> for KeepPolicy {
    fn from(cli: CliKeepPolicy) -> Self {
        match cli {
            CliKeepPolicy::First => KeepPolicy::First,
            CliKeepPolicy::Last => KeepPolicy::Last,
            CliKeepPolicy::None => KeepPolicy::None,
        }
    }
}

/// CLI-compatible outlier method enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutlierMethod {
    /// 1.5 x IQR fences
    Iqr,
    /// Absolute z-score above --outlier-threshold
    Zscore,
}

impl From<CliOutlierMethod> for OutlierMethod {
    fn from(cli: CliOutlierMethod) -> Self {
        match cli {
            CliOutlierMethod::Iqr => OutlierMethod::Iqr,
            CliOutlierMethod::Zscore => OutlierMethod::ZScore,
        }
    }
}

/// CLI-compatible outlier action enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutlierAction {
    /// Report outliers only
    Flag,
    /// Remove rows containing outliers
    Remove,
    /// Clip outliers to the computed bounds
    Cap,
}

impl From<CliOutlierAction> for OutlierAction {
    fn from(cli: CliOutlierAction) -> Self {
        match cli {
            CliOutlierAction::Flag => OutlierAction::Flag,
            CliOutlierAction::Remove => OutlierAction::Remove,
            CliOutlierAction::Cap => OutlierAction::Cap,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Tabular data cleaning with before/after quality scoring",
    long_about = "Cleans a CSV file and reports how its quality changed.\n\n\
                  EXAMPLES:\n  \
                  # Clean with defaults\n  \
                  data-cleanser -i data.csv\n\n  \
                  # Median fill, dedupe on a key, keep the latest row\n  \
                  data-cleanser -i data.csv --numeric-fill median --dedupe-on id --keep last\n\n  \
                  # Score the file without cleaning it\n  \
                  data-cleanser -i data.csv --dry-run"
)]
struct Args {
    /// Path to the CSV file to clean
    #[arg(short, long)]
    input: String,

    /// Output directory for results
    #[arg(short, long, default_value = "./outputs")]
    output: String,

    /// JSON file with a cleaning configuration
    ///
    /// Flags given on the command line override values from this file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Strategy for filling missing numeric values
    #[arg(long, value_enum)]
    numeric_fill: Option<CliNumericFill>,

    /// Strategy for filling missing text values
    #[arg(long, value_enum)]
    text_fill: Option<CliTextFill>,

    /// Placeholder used by `--text-fill constant`
    #[arg(long, default_value = "Unknown")]
    placeholder: String,

    /// Column forming the duplicate key (repeatable); all columns if omitted
    #[arg(long = "dedupe-on")]
    dedupe_on: Vec<String>,

    /// Which rows of a duplicate group survive
    #[arg(long, value_enum)]
    keep: Option<CliKeepPolicy>,

    /// Outlier detection rule
    #[arg(long, value_enum)]
    outlier_method: Option<CliOutlierMethod>,

    /// Z-score threshold
    #[arg(long)]
    outlier_threshold: Option<f64>,

    /// What to do with detected outliers
    #[arg(long, value_enum)]
    outlier_action: Option<CliOutlierAction>,

    /// Date format used to parse and write dates (chrono syntax)
    #[arg(long)]
    date_format: Option<String>,

    /// Score the input without cleaning it
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of a human-readable summary
    ///
    /// Disables all logs; only the final JSON report is written.
    #[arg(long)]
    json: bool,

    /// Write a detailed JSON report to the output directory
    ///
    /// The report will be saved as <input_name>_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,
}

/// Everything the CLI reports about one run.
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    input_file: &'a str,
    output_file: Option<String>,
    log: &'a data_cleanser::CleaningLog,
    issues: &'a [data_cleanser::ValidationIssue],
    validation: &'a ValidationReport,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only carries JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    dotenv().ok();

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    let config = build_config(&args)?;

    info!("Loading dataset from: {}", args.input);
    let raw = read_csv(&args.input)?;
    info!("Dataset loaded: {} rows x {} columns", raw.height(), raw.width());

    if args.dry_run {
        return run_dry_run(&args, &raw);
    }

    if !Path::new(&args.output).exists() {
        std::fs::create_dir_all(&args.output)?;
        info!("Created output directory: {}", args.output);
    }

    let mut builder = CleaningPipeline::builder().config(config.clone());
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    let pipeline = builder.build()?;

    let cleaned = pipeline.run(&raw);
    let validation = QualityScorer::new().validate(&raw, &cleaned.table);

    let input_stem = extract_file_stem(&args.input);
    let output_path = Path::new(&args.output).join(format!("{}_cleaned.csv", input_stem));
    write_csv(&cleaned.table, &output_path, &config.date_format)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    info!("Cleaned data written to: {}", output_path.display());

    let report = RunReport {
        input_file: &args.input,
        output_file: Some(output_path.display().to_string()),
        log: &cleaned.log,
        issues: &cleaned.issues,
        validation: &validation,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if args.emit_report {
        let report_path = Path::new(&args.output).join(format!("{}_report.json", input_stem));
        std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
        info!("Report written to: {}", report_path.display());
    }

    print_human_readable_summary(&args, &cleaned, &validation, &output_path);

    Ok(())
}

/// Start from `--config` (or defaults) and apply flag overrides.
fn build_config(args: &Args) -> Result<CleaningConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str::<CleaningConfig>(&raw)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => CleaningConfig::default(),
    };

    if let Some(fill) = args.numeric_fill {
        config.missing_strategy.numeric = fill.into();
    }
    if let Some(fill) = args.text_fill {
        config.missing_strategy.text = match fill {
            CliTextFill::Mode => TextFill::Mode,
            CliTextFill::Forward => TextFill::ForwardFill,
            CliTextFill::Backward => TextFill::BackwardFill,
            CliTextFill::Constant => TextFill::Placeholder(args.placeholder.clone()),
            CliTextFill::Drop => TextFill::RemoveRow,
        };
    }
    if !args.dedupe_on.is_empty() {
        config.duplicate_subset = Some(args.dedupe_on.clone());
    }
    if let Some(keep) = args.keep {
        config.duplicate_policy = keep.into();
    }
    if let Some(method) = args.outlier_method {
        config.outlier_method = method.into();
    }
    if let Some(threshold) = args.outlier_threshold {
        config.outlier_threshold = threshold;
    }
    if let Some(action) = args.outlier_action {
        config.outlier_action = action.into();
    }
    if let Some(ref format) = args.date_format {
        config.date_format = format.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Score the input and print what is wrong with it.
///
/// Uses `println!` for user-facing output, independent of the log level.
fn run_dry_run(args: &Args, raw: &Table) -> Result<()> {
    let assessment = QualityScorer::new().assess(raw);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Quality assessment only");
    println!("{}\n", "=".repeat(80));

    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", args.input);
    println!("  Rows: {}", assessment.basic_info.rows);
    println!("  Columns: {}", assessment.basic_info.columns);
    println!("  Approx. size: {} bytes", assessment.basic_info.memory_bytes);
    println!();

    println!("COLUMNS");
    println!("{}", "-".repeat(40));
    println!("{:<24} {:<12} {:<10} {:<10}", "Column", "Type", "Missing", "Unique");
    println!("{}", "-".repeat(60));
    for column in raw.columns() {
        let missing = assessment
            .completeness
            .missing_by_column
            .get(column.name())
            .copied()
            .unwrap_or(0);
        let unique = assessment
            .uniqueness
            .column_uniqueness
            .get(column.name())
            .copied()
            .unwrap_or(0.0);
        println!(
            "{:<24} {:<12} {:<10} {:<10.2}",
            truncate_str(column.name(), 23),
            column.column_type(),
            missing,
            unique
        );
    }
    println!();

    print_assessment(&assessment);

    println!("{}", "=".repeat(80));
    println!("To clean this file, run without --dry-run");
    println!("{}", "=".repeat(80));

    Ok(())
}

fn print_assessment(assessment: &QualityAssessment) {
    println!("QUALITY");
    println!("{}", "-".repeat(40));
    println!(
        "  Completeness: {:.1}% ({} missing)",
        assessment.completeness.score * 100.0,
        assessment.completeness.missing_count
    );
    println!(
        "  Uniqueness: {:.1}% ({} duplicate rows)",
        assessment.uniqueness.score * 100.0,
        assessment.uniqueness.duplicate_count
    );
    println!("  Consistency: {:.1}", assessment.consistency.score);
    println!("  Accuracy: {:.1}", assessment.accuracy.score);
    println!("  Validity: {:.1}", assessment.validity.score);
    println!("  Overall: {:.1}", assessment.overall_score);
    println!();

    let issues: Vec<_> = assessment.all_issues().collect();
    if !issues.is_empty() {
        println!("ISSUES");
        println!("{}", "-".repeat(40));
        for issue in issues {
            println!(
                "  - [{:?}] {}: {} ({} values)",
                issue.severity, issue.column, issue.description, issue.count
            );
        }
        println!();
    }
}

fn print_human_readable_summary(
    args: &Args,
    cleaned: &CleanOutput,
    validation: &ValidationReport,
    output_path: &Path,
) {
    let comparison = &validation.comparison;

    println!();
    println!("{}", "=".repeat(80));
    println!("CLEANING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input:  {} ({} rows x {} columns)",
        args.input, comparison.rows_before, comparison.columns_before
    );
    println!(
        "Output: {} ({} rows x {} columns)",
        output_path.display(),
        comparison.rows_after,
        comparison.columns_after
    );
    println!();

    println!("Summary:");
    println!(
        "  Missing values: {} -> {}",
        comparison.missing_before, comparison.missing_after
    );
    println!(
        "  Quality score: {:.1} -> {:.1} ({:+.1})",
        comparison.score_before, comparison.score_after, comparison.score_delta
    );
    println!();

    println!("Actions Taken:");
    for line in cleaned.log.summary_lines() {
        println!("  - {}", line);
    }
    println!();

    let failures = cleaned.log.failures().count();
    if failures > 0 {
        warn!("{} stage(s) failed; see the log above", failures);
    }

    if !validation.recommendations.is_empty() {
        println!("Recommendations:");
        for recommendation in &validation.recommendations {
            println!("  - {}", recommendation);
        }
        println!();
    }

    if args.emit_report {
        println!(
            "Report: {}/{}_report.json",
            args.output,
            extract_file_stem(&args.input)
        );
    } else {
        println!("Add --emit-report to save a detailed JSON report");
    }
}

/// Extract the file stem (name without extension) from a path.
fn extract_file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string()
}

/// Truncate a string to max length with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
