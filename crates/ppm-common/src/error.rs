//! Error types for predictive process monitoring.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//! - Suggested actions for agents
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Unsupported Input Format
//!   Reason: unsupported input format: events.xes
//!   Fix: Provide the event log as .csv, .csv.gz or a .zip containing a .csv file.
//! ```
//!
//! # Agent-Facing Output
//!
//! ```json
//! {
//!   "code": 32,
//!   "category": "config",
//!   "message": "prediction count 9 out of range 1..=4",
//!   "recoverable": false,
//!   "suggested_action": "run_check",
//!   "context": { "requested": 9, "max": 4 }
//! }
//! ```
//!
//! Errors raised while handling one prefix are wrapped in
//! [`Error::AtPrefix`]; code, category and hints come from the wrapped error.

use ppm_math::{DistributionError, ScaleError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::id::CaseId;

/// Result type alias for ppm operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed or unreadable event log input.
    Input,
    /// Model parameters or run configuration.
    Config,
    /// Probability distributions and numeric model output.
    Inference,
    /// Case selection and per-case batch state.
    Batch,
    /// The external sequence model.
    Predictor,
    /// File I/O and serialization.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Inference => write!(f, "inference"),
            ErrorCategory::Batch => write!(f, "batch"),
            ErrorCategory::Predictor => write!(f, "predictor"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested actions for agents to take in response to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the operation.
    Retry,
    /// Run the `check` command against the configuration.
    RunCheck,
    /// Correct the input event log.
    FixInput,
    /// Skip this case and continue.
    Skip,
    /// Abort the run.
    Abort,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::RunCheck => write!(f, "run_check"),
            SuggestedAction::FixInput => write!(f, "fix_input"),
            SuggestedAction::Skip => write!(f, "skip"),
            SuggestedAction::Abort => write!(f, "abort"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for predictive process monitoring.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors (10-29)
    #[error("parse error: {0}")]
    Parse(String),

    #[error("missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("row {row}: cannot parse timestamp '{value}' with format '{format}'")]
    InvalidTimestamp {
        value: String,
        format: String,
        row: usize,
    },

    #[error("unsupported input format: {path}")]
    UnsupportedFormat { path: String },

    // Configuration errors (30-39)
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unknown normalization method '{0}'")]
    UnknownNormMethod(String),

    #[error("prediction count {requested} out of range 1..={max}")]
    PredictionCountOutOfRange { requested: usize, max: usize },

    // Inference errors (40-49)
    #[error("invalid distribution: {0}")]
    InvalidDistribution(String),

    #[error("cannot draw {requested} distinct indices from {available} with nonzero mass")]
    InsufficientSupport { requested: usize, available: usize },

    #[error("non-finite model output for {field}")]
    NonFinite { field: String },

    // Batch errors (50-59)
    #[error("case filter [{min}, {max}] selected none of {considered} cases")]
    EmptyRange {
        min: usize,
        max: usize,
        considered: usize,
    },

    #[error("no anchor timestamp for case {case_id}")]
    MissingAnchor { case_id: CaseId },

    #[error("case {case_id}, prefix {prefix_len}: {source}")]
    AtPrefix {
        case_id: CaseId,
        prefix_len: usize,
        source: Box<Error>,
    },

    // Predictor errors (60-69)
    #[error("predictor failed: {0}")]
    Predictor(String),

    #[error("run cancelled")]
    Cancelled,

    // I/O errors (70-79)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Attach the case and prefix being processed. Already-located errors
    /// are returned unchanged.
    pub fn at_prefix(self, case_id: &CaseId, prefix_len: usize) -> Self {
        match self {
            e @ Error::AtPrefix { .. } | e @ Error::Cancelled => e,
            other => Error::AtPrefix {
                case_id: case_id.clone(),
                prefix_len,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through [`Error::AtPrefix`].
    pub fn root(&self) -> &Error {
        match self {
            Error::AtPrefix { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-29: Input errors
    /// - 30-39: Configuration errors
    /// - 40-49: Inference errors
    /// - 50-59: Batch errors
    /// - 60-69: Predictor errors
    /// - 70-79: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Parse(_) => 10,
            Error::MissingColumn { .. } => 11,
            Error::InvalidTimestamp { .. } => 12,
            Error::UnsupportedFormat { .. } => 20,
            Error::InvalidConfiguration(_) => 30,
            Error::UnknownNormMethod(_) => 31,
            Error::PredictionCountOutOfRange { .. } => 32,
            Error::InvalidDistribution(_) => 40,
            Error::InsufficientSupport { .. } => 41,
            Error::NonFinite { .. } => 42,
            Error::EmptyRange { .. } => 50,
            Error::MissingAnchor { .. } => 51,
            Error::AtPrefix { source, .. } => source.code(),
            Error::Predictor(_) => 60,
            Error::Cancelled => 61,
            Error::Io(_) => 70,
            Error::Json(_) => 71,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Parse(_)
            | Error::MissingColumn { .. }
            | Error::InvalidTimestamp { .. }
            | Error::UnsupportedFormat { .. } => ErrorCategory::Input,

            Error::InvalidConfiguration(_)
            | Error::UnknownNormMethod(_)
            | Error::PredictionCountOutOfRange { .. } => ErrorCategory::Config,

            Error::InvalidDistribution(_)
            | Error::InsufficientSupport { .. }
            | Error::NonFinite { .. } => ErrorCategory::Inference,

            Error::EmptyRange { .. } | Error::MissingAnchor { .. } => ErrorCategory::Batch,
            Error::AtPrefix { source, .. } => source.category(),

            Error::Predictor(_) | Error::Cancelled => ErrorCategory::Predictor,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable without
    /// changing inputs or configuration.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::AtPrefix { source, .. } => source.is_recoverable(),
            // the model may be flaky; the caller decides whether to retry
            Error::Predictor(_) => true,
            Error::Cancelled => true,
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Returns the suggested action for agents.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Parse(_)
            | Error::MissingColumn { .. }
            | Error::InvalidTimestamp { .. }
            | Error::UnsupportedFormat { .. } => SuggestedAction::FixInput,

            Error::InvalidConfiguration(_)
            | Error::UnknownNormMethod(_)
            | Error::PredictionCountOutOfRange { .. }
            | Error::EmptyRange { .. } => SuggestedAction::RunCheck,

            Error::InvalidDistribution(_)
            | Error::InsufficientSupport { .. }
            | Error::NonFinite { .. } => SuggestedAction::Skip,

            Error::MissingAnchor { .. } => SuggestedAction::Skip,
            Error::AtPrefix { source, .. } => source.suggested_action(),

            Error::Predictor(_) => SuggestedAction::Retry,
            Error::Cancelled => SuggestedAction::Abort,

            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Parse(_) => "Check that the event log is a well-formed CSV file with a header row.",
            Error::MissingColumn { .. } => {
                "Map the log's columns to caseid, task, user and the timestamp fields with 'read_options.column_names'."
            }
            Error::InvalidTimestamp { .. } => {
                "Set 'read_options.timeformat' to match the log, e.g. '%Y-%m-%dT%H:%M:%S.%f'."
            }
            Error::UnsupportedFormat { .. } => {
                "Provide the event log as .csv, .csv.gz or a .zip containing a .csv file."
            }
            Error::InvalidConfiguration(_) => {
                "Run 'ppm check' to validate the model parameters and run configuration."
            }
            Error::UnknownNormMethod(_) => {
                "Use one of lognorm, normal, standard, max or none for 'norm_method'."
            }
            Error::PredictionCountOutOfRange { .. } => {
                "Lower 'multiprednum' to at most the smaller of the activity and role vocabulary sizes."
            }
            Error::InvalidDistribution(_) => {
                "The model returned probabilities that do not form a distribution. Check the model's output layer."
            }
            Error::InsufficientSupport { .. } => {
                "Lower 'multiprednum' or use 'multi_pred', which does not require nonzero mass."
            }
            Error::NonFinite { .. } => {
                "The model produced NaN or infinite values. Check the model and its scale arguments."
            }
            Error::EmptyRange { .. } => {
                "Widen 'case_filter.event_count_range' or check 'case_filter.case_ids' against the log."
            }
            Error::MissingAnchor { .. } => {
                "The case has no real events to anchor timestamps. Check the case filter and the log."
            }
            Error::AtPrefix { source, .. } => source.remediation(),
            Error::Predictor(_) => {
                "Retry the run. If persistent, check that the predictor covers every case and prefix."
            }
            Error::Cancelled => "The run was cancelled before completion. Re-run to produce results.",
            Error::Io(_) => "Check that the file exists, is readable, and the output location is writable.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq .' or regenerate the file.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Parse(_) => "Event Log Parse Error",
            Error::MissingColumn { .. } => "Missing Column",
            Error::InvalidTimestamp { .. } => "Invalid Timestamp",
            Error::UnsupportedFormat { .. } => "Unsupported Input Format",
            Error::InvalidConfiguration(_) => "Invalid Configuration",
            Error::UnknownNormMethod(_) => "Unknown Normalization Method",
            Error::PredictionCountOutOfRange { .. } => "Prediction Count Out of Range",
            Error::InvalidDistribution(_) => "Invalid Distribution",
            Error::InsufficientSupport { .. } => "Insufficient Support",
            Error::NonFinite { .. } => "Non-Finite Model Output",
            Error::EmptyRange { .. } => "Empty Case Selection",
            Error::MissingAnchor { .. } => "Missing Anchor Timestamp",
            Error::AtPrefix { source, .. } => source.headline(),
            Error::Predictor(_) => "Predictor Error",
            Error::Cancelled => "Run Cancelled",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
        }
    }

    fn fill_context(&self, context: &mut BTreeMap<String, serde_json::Value>) {
        match self {
            Error::MissingColumn { column } => {
                context.insert("column".to_string(), serde_json::json!(column));
            }
            Error::InvalidTimestamp { value, format, row } => {
                context.insert("value".to_string(), serde_json::json!(value));
                context.insert("format".to_string(), serde_json::json!(format));
                context.insert("row".to_string(), serde_json::json!(row));
            }
            Error::UnsupportedFormat { path } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            Error::PredictionCountOutOfRange { requested, max } => {
                context.insert("requested".to_string(), serde_json::json!(requested));
                context.insert("max".to_string(), serde_json::json!(max));
            }
            Error::InsufficientSupport {
                requested,
                available,
            } => {
                context.insert("requested".to_string(), serde_json::json!(requested));
                context.insert("available".to_string(), serde_json::json!(available));
            }
            Error::EmptyRange {
                min,
                max,
                considered,
            } => {
                context.insert("min".to_string(), serde_json::json!(min));
                context.insert("max".to_string(), serde_json::json!(max));
                context.insert("considered".to_string(), serde_json::json!(considered));
            }
            Error::MissingAnchor { case_id } => {
                context.insert("case_id".to_string(), serde_json::json!(case_id));
            }
            Error::AtPrefix {
                case_id,
                prefix_len,
                source,
            } => {
                context.insert("case_id".to_string(), serde_json::json!(case_id));
                context.insert("prefix_len".to_string(), serde_json::json!(prefix_len));
                source.fill_context(context);
            }
            _ => {}
        }
    }
}

impl From<ScaleError> for Error {
    fn from(err: ScaleError) -> Self {
        match err {
            ScaleError::UnknownMethod(name) => Error::UnknownNormMethod(name),
            other => Error::InvalidConfiguration(other.to_string()),
        }
    }
}

impl From<DistributionError> for Error {
    fn from(err: DistributionError) -> Self {
        match err {
            DistributionError::InsufficientSupport {
                requested,
                available,
            } => Error::InsufficientSupport {
                requested,
                available,
            },
            other => Error::InvalidDistribution(other.to_string()),
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action for agents.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (case id, prefix length, file path).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = BTreeMap::new();
        err.fill_context(&mut context);

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }

    /// Serialize to pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

/// Result of a batch operation that may have partial success.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchResult<T> {
    /// Successfully completed items.
    pub succeeded: Vec<T>,

    /// Failed items with their errors.
    pub failed: Vec<BatchError>,

    /// Summary statistics.
    pub summary: BatchSummary,
}

/// A single error in a batch operation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchError {
    /// Identifier of the failed item (the case id for batch runs).
    pub item_id: String,

    /// The structured error.
    pub error: StructuredError,
}

/// Summary of batch operation results.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub all_succeeded: bool,
    pub any_succeeded: bool,
}

impl<T> BatchResult<T> {
    /// Create a new batch result from succeeded and failed items.
    pub fn new(succeeded: Vec<T>, failed: Vec<BatchError>) -> Self {
        let total = succeeded.len() + failed.len();
        let succeeded_count = succeeded.len();
        let failed_count = failed.len();

        BatchResult {
            succeeded,
            failed,
            summary: BatchSummary {
                total,
                succeeded: succeeded_count,
                failed: failed_count,
                all_succeeded: failed_count == 0,
                any_succeeded: succeeded_count > 0,
            },
        }
    }

    /// Add a failure to the batch result.
    pub fn add_failure(&mut self, item_id: impl Into<String>, error: &Error) {
        self.failed.push(BatchError {
            item_id: item_id.into(),
            error: StructuredError::from(error),
        });
        self.summary.failed += 1;
        self.summary.total += 1;
        self.summary.all_succeeded = false;
    }

    /// Add a success to the batch result.
    pub fn add_success(&mut self, item: T) {
        self.succeeded.push(item);
        self.summary.succeeded += 1;
        self.summary.total += 1;
        self.summary.any_succeeded = true;
    }
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}

/// Format per-case outcome counts and skipped cases for stderr.
pub fn format_batch_human(
    summary: &BatchSummary,
    failures: &[BatchError],
    use_color: bool,
) -> String {
    let (green, red, reset) = if use_color {
        ("\x1b[32m", "\x1b[31m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    let mut output = String::new();

    if summary.all_succeeded {
        output.push_str(&format!(
            "{green}✓{reset} All {} cases completed successfully\n",
            summary.total
        ));
    } else if summary.any_succeeded {
        output.push_str(&format!(
            "Partial success: {} of {} cases completed\n",
            summary.succeeded, summary.total
        ));
    } else {
        output.push_str(&format!("{red}✗{reset} All {} cases failed\n", summary.total));
    }

    if !failures.is_empty() {
        output.push_str("\nSkipped:\n");
        for batch_err in failures {
            output.push_str(&format!(
                "  {red}✗{reset} {}: {}\n",
                batch_err.item_id, batch_err.error.message
            ));
        }
    }

    output
}
