//! Run configuration.
//!
//! Operational parameters of one batch run. Loadable from TOML, YAML or JSON,
//! chosen by file extension; every field has a default.
//!
//! ```toml
//! variant = "multi_pred"
//! multiprednum = 3
//! seed = 42
//! max_parallel = 4
//!
//! [read_options]
//! timeformat = "%Y-%m-%d %H:%M:%S"
//!
//! [case_filter]
//! event_count_range = { min = 2, max = 40 }
//!
//! [prefix_source]
//! kind = "prediction"
//! start_prefix = 2
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::validate::{ValidationError, ValidationResult};

/// Default timestamp format of exported event logs.
pub const DEFAULT_TIMEFORMAT: &str = "%Y-%m-%dT%H:%M:%S.%f";

/// How predicted indices are chosen from a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecodeVariant {
    #[default]
    ArgMax,
    RandomChoice,
    MultiPred,
    MultiPredRand,
}

impl DecodeVariant {
    /// Whether the variant yields more than one prediction per step.
    pub fn is_multi(&self) -> bool {
        matches!(self, DecodeVariant::MultiPred | DecodeVariant::MultiPredRand)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeVariant::ArgMax => "arg_max",
            DecodeVariant::RandomChoice => "random_choice",
            DecodeVariant::MultiPred => "multi_pred",
            DecodeVariant::MultiPredRand => "multi_pred_rand",
        }
    }
}

impl std::fmt::Display for DecodeVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Batch,
    /// Single-event interactive prediction. Not served by the batch engine.
    Next,
}

/// How reconstructed timestamps start for each case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnchorMode {
    /// Every record, the first included, adds its own delta to the
    /// previous timestamp (the anchor for the first record).
    #[default]
    Accumulate,
    /// The first record sits on the anchor; later records add their delta.
    AnchorFirst,
}

/// What to do when one case fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    Abort,
    SkipCase,
}

/// Where the prefixes fed to the model come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrefixSource {
    /// Ground-truth prefixes taken from the log.
    #[default]
    Log,
    /// Seed with the first `start_prefix` real events, then extend with the
    /// model's own top-ranked predictions.
    Prediction { start_prefix: usize },
}

/// Inclusive bounds on a case's real-event count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EventCountRange {
    pub min: usize,
    pub max: usize,
}

impl EventCountRange {
    pub fn contains(&self, n: usize) -> bool {
        self.min <= n && n <= self.max
    }
}

/// Selection of the cases to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CaseFilter {
    pub event_count_range: Option<EventCountRange>,
    /// Restrict to these case ids.
    pub case_ids: Option<Vec<String>>,
}

impl CaseFilter {
    pub fn is_empty(&self) -> bool {
        self.event_count_range.is_none() && self.case_ids.is_none()
    }
}

/// How the event log is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReadOptions {
    /// External column name to canonical name.
    pub column_names: BTreeMap<String, String>,
    /// strftime-style format; Python's `%f` after a dot is accepted.
    pub timeformat: String,
    pub one_timestamp: bool,
    /// Drop columns that are neither canonical nor inter-case features.
    pub filter_extraneous_columns: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        let column_names = [
            ("Case ID", "caseid"),
            ("Activity", "task"),
            ("lifecycle:transition", "event_type"),
            ("Resource", "user"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            column_names,
            timeformat: DEFAULT_TIMEFORMAT.to_string(),
            one_timestamp: true,
            filter_extraneous_columns: true,
        }
    }
}

/// Operational parameters for one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RunConfig {
    pub variant: DecodeVariant,
    /// Predictions per step for the multi variants.
    pub multiprednum: usize,
    pub mode: RunMode,
    pub one_timestamp: bool,
    pub read_options: ReadOptions,
    pub case_filter: CaseFilter,
    pub prefix_source: PrefixSource,
    /// Seed for the sampling variants; fresh entropy when absent.
    pub seed: Option<u64>,
    /// Cases processed concurrently.
    pub max_parallel: usize,
    pub anchor_mode: AnchorMode,
    pub on_case_error: FailurePolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            variant: DecodeVariant::default(),
            multiprednum: 1,
            mode: RunMode::default(),
            one_timestamp: true,
            read_options: ReadOptions::default(),
            case_filter: CaseFilter::default(),
            prefix_source: PrefixSource::default(),
            seed: None,
            max_parallel: 1,
            anchor_mode: AnchorMode::default(),
            on_case_error: FailurePolicy::default(),
        }
    }
}

impl RunConfig {
    /// Number of predictions per step after applying the variant: the
    /// single-valued variants always use one.
    pub fn effective_prediction_count(&self) -> usize {
        if self.variant.is_multi() {
            self.multiprednum
        } else {
            1
        }
    }

    /// Load a run configuration, detecting the format from the extension.
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_str_with_format(&content, format)
    }

    pub fn from_str_with_format(content: &str, format: ConfigFormat) -> ValidationResult<Self> {
        let config = match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| {
                ValidationError::ParseError(format!("failed to parse toml run config: {}", e))
            })?,
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| {
                ValidationError::ParseError(format!("failed to parse yaml run config: {}", e))
            })?,
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| {
                ValidationError::ParseError(format!("failed to parse json run config: {}", e))
            })?,
        };
        Ok(config)
    }
}

/// Serialization format of a run configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

pub fn detect_format(path: &Path) -> ValidationResult<ConfigFormat> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "toml" => Ok(ConfigFormat::Toml),
        "yaml" | "yml" => Ok(ConfigFormat::Yaml),
        "json" => Ok(ConfigFormat::Json),
        _ => Err(ValidationError::ParseError(format!(
            "unsupported run config format: '{}' ({})",
            ext,
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("run.toml")).unwrap(), ConfigFormat::Toml);
        assert_eq!(detect_format(Path::new("run.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(detect_format(Path::new("run.YAML")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(detect_format(Path::new("run.json")).unwrap(), ConfigFormat::Json);
        assert!(detect_format(Path::new("run.ini")).is_err());
    }

    #[test]
    fn defaults() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.variant, DecodeVariant::ArgMax);
        assert_eq!(cfg.read_options.timeformat, DEFAULT_TIMEFORMAT);
        assert_eq!(
            cfg.read_options.column_names.get("Case ID").map(String::as_str),
            Some("caseid")
        );
        assert_eq!(cfg.prefix_source, PrefixSource::Log);
        assert_eq!(cfg.effective_prediction_count(), 1);
    }

    #[test]
    fn parse_toml() {
        let cfg = RunConfig::from_str_with_format(
            r#"
variant = "multi_pred_rand"
multiprednum = 3
seed = 9
anchor_mode = "anchor_first"
on_case_error = "skip_case"

[case_filter]
event_count_range = { min = 2, max = 10 }
case_ids = ["C1", "C2"]

[prefix_source]
kind = "prediction"
start_prefix = 2
"#,
            ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(cfg.variant, DecodeVariant::MultiPredRand);
        assert_eq!(cfg.effective_prediction_count(), 3);
        assert_eq!(cfg.seed, Some(9));
        assert_eq!(cfg.anchor_mode, AnchorMode::AnchorFirst);
        assert_eq!(cfg.on_case_error, FailurePolicy::SkipCase);
        assert_eq!(
            cfg.case_filter.event_count_range,
            Some(EventCountRange { min: 2, max: 10 })
        );
        assert_eq!(cfg.prefix_source, PrefixSource::Prediction { start_prefix: 2 });
        // untouched sections keep their defaults
        assert!(cfg.read_options.filter_extraneous_columns);
    }

    #[test]
    fn parse_yaml_and_json() {
        let yaml = RunConfig::from_str_with_format(
            "variant: random_choice\nmax_parallel: 8\n",
            ConfigFormat::Yaml,
        )
        .unwrap();
        assert_eq!(yaml.variant, DecodeVariant::RandomChoice);
        assert_eq!(yaml.max_parallel, 8);

        let json = RunConfig::from_str_with_format(
            r#"{"mode": "next", "one_timestamp": false}"#,
            ConfigFormat::Json,
        )
        .unwrap();
        assert_eq!(json.mode, RunMode::Next);
        assert!(!json.one_timestamp);
    }

    #[test]
    fn unknown_variant_is_parse_error() {
        let err = RunConfig::from_str_with_format("variant = \"beam\"", ConfigFormat::Toml)
            .unwrap_err();
        assert!(matches!(err, ValidationError::ParseError(_)));
    }

    #[test]
    fn single_variants_force_one_prediction() {
        let cfg = RunConfig {
            variant: DecodeVariant::RandomChoice,
            multiprednum: 5,
            ..RunConfig::default()
        };
        assert_eq!(cfg.effective_prediction_count(), 1);
    }
}
