//! Exit codes for the `ppm` CLI.
//!
//! Exit codes communicate operation outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-9: Success/operational outcomes
//! - 10-19: User/input errors (recoverable by fixing input or configuration)
//! - 20-29: Internal errors

use ppm_common::{Error, ErrorCategory};

/// Exit codes for ppm operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Success / Operational Outcomes (0-9)
    // ========================================================================
    /// Every case completed
    Clean = 0,

    /// Some cases were skipped under the skip_case policy
    PartialFail = 3,

    /// Run cancelled before completion
    Cancelled = 6,

    // ========================================================================
    // User / Input Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Invalid or missing configuration
    ConfigError = 11,

    /// Event log could not be read or parsed
    InputError = 12,

    /// Model output or case selection violated a constraint
    DataError = 13,

    /// The external predictor failed
    PredictorError = 14,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// User/input errors (codes 10-19).
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::PartialFail => "ERR_PARTIAL",
            ExitCode::Cancelled => "ERR_CANCELLED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InputError => "ERR_INPUT",
            ExitCode::DataError => "ERR_DATA",
            ExitCode::PredictorError => "ERR_PREDICTOR",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        if matches!(err.root(), Error::Cancelled) {
            return ExitCode::Cancelled;
        }
        match err.category() {
            ErrorCategory::Input => ExitCode::InputError,
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Inference | ErrorCategory::Batch => ExitCode::DataError,
            ErrorCategory::Predictor => ExitCode::PredictorError,
            ErrorCategory::Io => ExitCode::IoError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
