//! Predictive process monitoring configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the model parameter file and the run configuration
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation
//! - Config snapshots for run provenance

pub mod params;
pub mod resolve;
pub mod run;
pub mod snapshot;
pub mod validate;

pub use params::{Dim, ModelParameters, ScaleArgsSpec, VectorizerKind, Vocabulary};
pub use resolve::{resolve_config, ConfigPaths, ConfigSource};
pub use run::{
    AnchorMode, CaseFilter, DecodeVariant, EventCountRange, FailurePolicy, PrefixSource,
    ReadOptions, RunConfig, RunMode,
};
pub use snapshot::ConfigSnapshot;
pub use validate::{ValidationError, ValidationResult};

use std::path::Path;

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = ppm_common::SCHEMA_VERSION;

/// Fully loaded and validated configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub params: ModelParameters,
    pub run: RunConfig,
    pub snapshot: ConfigSnapshot,
}

impl Config {
    /// Load both files from resolved paths and validate them together.
    ///
    /// The parameter file is mandatory; the run configuration falls back to
    /// built-in defaults.
    pub fn load(paths: &ConfigPaths) -> ValidationResult<Self> {
        let params_path = paths.params.as_deref().ok_or_else(|| {
            ValidationError::MissingField(
                "model parameter file (pass --params or set PPM_PARAMS)".to_string(),
            )
        })?;
        let (params, params_content) = read_with(params_path, ModelParameters::from_str)?;
        let (run, run_content) = match paths.run.as_deref() {
            Some(path) => {
                let (run, content) =
                    read_with(path, |s| RunConfig::from_str_with_format(s, run::detect_format(path)?))?;
                (run, Some(content))
            }
            None => (RunConfig::default(), None),
        };

        validate::validate_params(&params)?;
        validate::validate_run(&run, &params)?;

        let snapshot = ConfigSnapshot::new(
            &params,
            &run,
            paths,
            &params_content,
            run_content.as_deref(),
        );
        Ok(Config {
            params,
            run,
            snapshot,
        })
    }
}

fn read_with<T>(
    path: &Path,
    parse: impl FnOnce(&str) -> ValidationResult<T>,
) -> ValidationResult<(T, String)> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let value = parse(&content)?;
    Ok((value, content))
}
