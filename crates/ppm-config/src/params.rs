//! Model parameter file.
//!
//! Written next to a trained model; records how the model was trained so the
//! batch pipeline can reproduce its input encoding and invert its output
//! normalization.
//!
//! ```json
//! {
//!   "model_file": "model.h5",
//!   "norm_method": "lognorm",
//!   "scale_args": { "max_value": 12.1, "min_value": 0.0 },
//!   "dim": { "time_dim": 5 },
//!   "vectorizer": "basic",
//!   "one_timestamp": true,
//!   "index_ac": { "Start": 0, "A": 1, "B": 2, "End": 3 },
//!   "index_rl": { "Start": 0, "R1": 1, "End": 2 }
//! }
//! ```

use ppm_math::{NormMethod, ScaleArgs, ScaleError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::validate::{ValidationError, ValidationResult};

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

/// Persisted training-time parameters of a sequence model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelParameters {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Name of the training log.
    #[serde(default)]
    pub file_name: Option<String>,

    /// Path or identifier of the trained model artifact.
    pub model_file: String,

    /// Normalization method name; `null` means no normalization.
    #[serde(default)]
    pub norm_method: Option<String>,

    #[serde(default)]
    pub scale_args: ScaleArgsSpec,

    pub dim: Dim,

    #[serde(default)]
    pub vectorizer: VectorizerKind,

    #[serde(default = "default_true")]
    pub one_timestamp: bool,

    /// Activity label to index.
    pub index_ac: BTreeMap<String, usize>,

    /// Role label to index.
    pub index_rl: BTreeMap<String, usize>,

    /// Event attribute columns used as inter-case features, in order.
    #[serde(default)]
    pub inter_features: Vec<String>,
}

/// Window dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Dim {
    pub time_dim: usize,
}

/// Input vectorization used at training time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VectorizerKind {
    #[default]
    Basic,
    /// Basic channels plus inter-case features.
    Inter,
}

/// Scale arguments: one set in single-timestamp mode, one per channel in
/// dual-timestamp mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ScaleArgsSpec {
    Dual { dur: ScaleArgs, wait: ScaleArgs },
    Single(ScaleArgs),
}

impl Default for ScaleArgsSpec {
    fn default() -> Self {
        ScaleArgsSpec::Single(ScaleArgs::default())
    }
}

impl ScaleArgsSpec {
    /// Arguments for the duration channel.
    pub fn dur(&self) -> &ScaleArgs {
        match self {
            ScaleArgsSpec::Single(args) => args,
            ScaleArgsSpec::Dual { dur, .. } => dur,
        }
    }

    /// Arguments for the waiting-time channel, present only in dual mode.
    pub fn wait(&self) -> Option<&ScaleArgs> {
        match self {
            ScaleArgsSpec::Single(_) => None,
            ScaleArgsSpec::Dual { wait, .. } => Some(wait),
        }
    }

    pub fn is_dual(&self) -> bool {
        matches!(self, ScaleArgsSpec::Dual { .. })
    }
}

impl ModelParameters {
    /// Load parameters from a JSON file.
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_str(&content)
    }

    /// Parse parameters from a JSON string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> ValidationResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// The normalization method.
    pub fn norm(&self) -> Result<NormMethod, ScaleError> {
        NormMethod::parse(self.norm_method.as_deref())
    }

    pub fn time_dim(&self) -> usize {
        self.dim.time_dim
    }

    /// Upper bound on the number of predictions per step, shared by the
    /// activity and role channels.
    pub fn max_predictions(&self) -> usize {
        self.index_ac.len().min(self.index_rl.len())
    }

    pub fn activities(&self) -> ValidationResult<Vocabulary> {
        Vocabulary::new("index_ac", &self.index_ac)
    }

    pub fn roles(&self) -> ValidationResult<Vocabulary> {
        Vocabulary::new("index_rl", &self.index_rl)
    }
}

/// Bidirectional label/index mapping for one categorical channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    index: BTreeMap<String, usize>,
    labels: Vec<Option<String>>,
}

impl Vocabulary {
    /// Build from a label → index map. Indices must be unique and cover
    /// `0..len`.
    pub fn new(field: &str, index: &BTreeMap<String, usize>) -> ValidationResult<Self> {
        if index.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: field.to_string(),
                message: "vocabulary must not be empty".to_string(),
            });
        }
        let mut labels = vec![None; index.len()];
        for (label, &idx) in index {
            if idx >= labels.len() {
                return Err(ValidationError::InvalidValue {
                    field: field.to_string(),
                    message: format!(
                        "index {idx} of '{label}' outside 0..{}; indices must be contiguous",
                        labels.len()
                    ),
                });
            }
            if let Some(existing) = &labels[idx] {
                return Err(ValidationError::InvalidValue {
                    field: field.to_string(),
                    message: format!("index {idx} assigned to both '{existing}' and '{label}'"),
                });
            }
            labels[idx] = Some(label.clone());
        }
        Ok(Self {
            index: index.clone(),
            labels,
        })
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn label(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).and_then(|l| l.as_deref())
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Expected length of a distribution over this vocabulary.
    pub fn width(&self) -> usize {
        self.labels.len()
    }
}
