//! Configuration snapshots for run provenance.
//!
//! A snapshot captures the exact configuration state at the start of a run,
//! so results can be traced back to the model parameters that produced them.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::params::ModelParameters;
use crate::resolve::ConfigPaths;
use crate::run::RunConfig;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the parameter file.
    pub schema_version: String,

    /// SHA-256 hash of the parameter file content.
    pub params_hash: String,

    #[serde(default)]
    pub params_path: Option<String>,

    pub params_source: String,

    /// SHA-256 hash of the run configuration content (None if defaults).
    #[serde(default)]
    pub run_hash: Option<String>,

    #[serde(default)]
    pub run_path: Option<String>,

    pub run_source: String,

    /// Combined hash of both files (for quick comparison).
    pub combined_hash: String,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConfigSummary {
    pub model_file: String,
    pub norm_method: String,
    pub time_dim: usize,
    pub vectorizer: String,
    pub one_timestamp: bool,
    pub activities: usize,
    pub roles: usize,
    pub variant: String,
    pub prediction_count: usize,
    pub seed: Option<u64>,
}

impl ConfigSnapshot {
    /// Create a new snapshot from loaded configuration and the raw file
    /// contents it was parsed from.
    pub fn new(
        params: &ModelParameters,
        run: &RunConfig,
        paths: &ConfigPaths,
        params_content: &str,
        run_content: Option<&str>,
    ) -> Self {
        let params_hash = compute_sha256(params_content);
        let run_hash = run_content.map(compute_sha256);

        let mut combined = Sha256::new();
        combined.update(params_hash.as_bytes());
        if let Some(h) = &run_hash {
            combined.update(h.as_bytes());
        }
        let combined_hash = hex::encode(combined.finalize());

        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: params.schema_version.clone(),
            params_hash,
            params_path: paths.params.as_ref().map(|p| p.display().to_string()),
            params_source: paths.params_source.to_string(),
            run_hash,
            run_path: run_content
                .and(paths.run.as_ref())
                .map(|p| p.display().to_string()),
            run_source: paths.run_source.to_string(),
            combined_hash,
            summary: ConfigSummary {
                model_file: params.model_file.clone(),
                norm_method: params
                    .norm_method
                    .clone()
                    .unwrap_or_else(|| "none".to_string()),
                time_dim: params.dim.time_dim,
                vectorizer: match params.vectorizer {
                    crate::VectorizerKind::Basic => "basic".to_string(),
                    crate::VectorizerKind::Inter => "inter".to_string(),
                },
                one_timestamp: params.one_timestamp,
                activities: params.index_ac.len(),
                roles: params.index_rl.len(),
                variant: run.variant.to_string(),
                prediction_count: run.effective_prediction_count(),
                seed: run.seed,
            },
        }
    }

    /// Return true if the run configuration came from built-in defaults.
    pub fn run_is_default(&self) -> bool {
        self.run_hash.is_none()
    }
}

/// Compute SHA-256 hash of a string.
pub fn compute_sha256(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ConfigSource;
    use std::path::PathBuf;

    const PARAMS: &str = r#"{
        "model_file": "m.h5",
        "dim": {"time_dim": 4},
        "index_ac": {"A": 0, "B": 1},
        "index_rl": {"R": 0}
    }"#;

    fn paths() -> ConfigPaths {
        ConfigPaths {
            params: Some(PathBuf::from("/models/params.json")),
            run: None,
            params_source: ConfigSource::CliArgument,
            run_source: ConfigSource::BuiltinDefault,
        }
    }

    #[test]
    fn test_sha256_hash() {
        let hash = compute_sha256("test content");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, compute_sha256("test content"));
    }

    #[test]
    fn test_snapshot_with_default_run() {
        let params = ModelParameters::from_str(PARAMS).unwrap();
        let snap = ConfigSnapshot::new(&params, &RunConfig::default(), &paths(), PARAMS, None);
        assert!(snap.run_is_default());
        assert_eq!(snap.params_source, "CLI argument");
        assert_eq!(snap.run_source, "builtin default");
        assert_eq!(snap.summary.norm_method, "none");
        assert_eq!(snap.summary.activities, 2);
        assert_eq!(snap.summary.variant, "arg_max");
        assert_eq!(snap.params_path.as_deref(), Some("/models/params.json"));
    }

    #[test]
    fn test_combined_hash_tracks_run_config() {
        let params = ModelParameters::from_str(PARAMS).unwrap();
        let run = RunConfig::default();
        let a = ConfigSnapshot::new(&params, &run, &paths(), PARAMS, None);
        let b = ConfigSnapshot::new(&params, &run, &paths(), PARAMS, Some("seed = 1"));
        assert_eq!(a.params_hash, b.params_hash);
        assert_ne!(a.combined_hash, b.combined_hash);
    }
}
