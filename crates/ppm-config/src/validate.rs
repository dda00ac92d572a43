//! Configuration validation errors and semantic validation.

use ppm_math::{NormMethod, ScaleError};
use thiserror::Error;

use crate::params::{ModelParameters, VectorizerKind};
use crate::run::{PrefixSource, RunConfig};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Unknown normalization method: {0}")]
    UnknownNormMethod(String),

    #[error("multiprednum {requested} out of range 1..={max}")]
    PredictionCount { requested: usize, max: usize },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 70,
            ValidationError::ParseError(_) => 30,
            ValidationError::SemanticError(_) => 30,
            ValidationError::MissingField(_) => 30,
            ValidationError::InvalidValue { .. } => 30,
            ValidationError::UnknownNormMethod(_) => 31,
            ValidationError::PredictionCount { .. } => 32,
            ValidationError::VersionMismatch { .. } => 30,
        }
    }
}

impl From<ScaleError> for ValidationError {
    fn from(err: ScaleError) -> Self {
        match err {
            ScaleError::UnknownMethod(name) => ValidationError::UnknownNormMethod(name),
            other => ValidationError::InvalidValue {
                field: "scale_args".to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<ValidationError> for ppm_common::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::IoError(msg) => ppm_common::Error::Io(std::io::Error::other(msg)),
            ValidationError::UnknownNormMethod(name) => ppm_common::Error::UnknownNormMethod(name),
            ValidationError::PredictionCount { requested, max } => {
                ppm_common::Error::PredictionCountOutOfRange { requested, max }
            }
            other => ppm_common::Error::InvalidConfiguration(other.to_string()),
        }
    }
}

/// Validate a model parameter file on its own.
pub fn validate_params(params: &ModelParameters) -> ValidationResult<()> {
    let major = |v: &str| v.split('.').next().map(str::to_string);
    if major(&params.schema_version) != major(crate::CONFIG_SCHEMA_VERSION) {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: params.schema_version.clone(),
        });
    }

    if params.dim.time_dim == 0 {
        return Err(ValidationError::InvalidValue {
            field: "dim.time_dim".to_string(),
            message: "Must be at least 1".to_string(),
        });
    }

    let method = params.norm()?;
    validate_scale_args(params, method)?;

    params.activities()?;
    params.roles()?;

    if params.vectorizer == VectorizerKind::Inter && params.inter_features.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "inter_features".to_string(),
            message: "The inter vectorizer needs at least one feature column".to_string(),
        });
    }

    Ok(())
}

fn validate_scale_args(params: &ModelParameters, method: NormMethod) -> ValidationResult<()> {
    match (params.one_timestamp, params.scale_args.is_dual()) {
        (true, true) => {
            return Err(ValidationError::SemanticError(
                "scale_args has dur/wait sub-objects but one_timestamp is true".to_string(),
            ))
        }
        (false, false) if method != NormMethod::Identity => {
            return Err(ValidationError::SemanticError(
                "dual-timestamp models need scale_args.dur and scale_args.wait".to_string(),
            ))
        }
        _ => {}
    }
    params.scale_args.dur().check(method)?;
    if let Some(wait) = params.scale_args.wait() {
        wait.check(method)?;
    }
    Ok(())
}

/// Validate a run configuration against the model it will drive.
pub fn validate_run(run: &RunConfig, params: &ModelParameters) -> ValidationResult<()> {
    if run.variant.is_multi() {
        let max = params.max_predictions();
        if run.multiprednum == 0 || run.multiprednum > max {
            return Err(ValidationError::PredictionCount {
                requested: run.multiprednum,
                max,
            });
        }
    }

    if run.one_timestamp != params.one_timestamp {
        return Err(ValidationError::SemanticError(format!(
            "run one_timestamp={} but the model was trained with one_timestamp={}",
            run.one_timestamp, params.one_timestamp
        )));
    }
    if run.read_options.one_timestamp != run.one_timestamp {
        return Err(ValidationError::SemanticError(format!(
            "read_options.one_timestamp={} disagrees with one_timestamp={}",
            run.read_options.one_timestamp, run.one_timestamp
        )));
    }

    if run.read_options.timeformat.is_empty() {
        return Err(ValidationError::MissingField("read_options.timeformat".to_string()));
    }

    if run.max_parallel == 0 {
        return Err(ValidationError::InvalidValue {
            field: "max_parallel".to_string(),
            message: "Must be at least 1".to_string(),
        });
    }

    if let Some(range) = run.case_filter.event_count_range {
        if range.min > range.max {
            return Err(ValidationError::InvalidValue {
                field: "case_filter.event_count_range".to_string(),
                message: format!("min ({}) must not exceed max ({})", range.min, range.max),
            });
        }
    }

    if let PrefixSource::Prediction { start_prefix } = run.prefix_source {
        if start_prefix == 0 {
            return Err(ValidationError::InvalidValue {
                field: "prefix_source.start_prefix".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }
    }

    Ok(())
}
