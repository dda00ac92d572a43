//! The seam to the sequence model.
//!
//! The model itself is opaque: a [`Predictor`] maps one feature window to
//! an activity distribution, a role distribution and the raw (normalized)
//! time predictions. Implementations must tolerate concurrent calls.
//!
//! [`ReplayPredictor`] serves outputs recorded by an externally executed
//! model, one JSON object per line:
//!
//! ```json
//! {"caseid": "C1", "pref_size": 1, "activity": [0.1, 0.9], "role": [1.0], "times": [0.3]}
//! ```

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use ppm_common::{CaseId, Error};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::encode::FeatureWindow;

/// Errors returned by predictors.
#[derive(Debug, thiserror::Error)]
pub enum PredictorError {
    #[error("no prediction recorded for case {case_id} at prefix {prefix_len}")]
    Missing { case_id: CaseId, prefix_len: usize },

    #[error("replay line {line}: {message}")]
    Replay { line: usize, message: String },

    #[error("{0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PredictorError> for Error {
    fn from(err: PredictorError) -> Self {
        match err {
            PredictorError::Io(e) => Error::Io(e),
            other => Error::Predictor(other.to_string()),
        }
    }
}

/// One model invocation.
#[derive(Debug, Clone, Copy)]
pub struct PredictionRequest<'a> {
    pub case_id: &'a CaseId,
    pub prefix_len: usize,
    pub window: &'a FeatureWindow,
}

/// Raw model output for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelOutput {
    /// Distribution over `index_ac`.
    pub activity: Vec<f64>,
    /// Distribution over `index_rl`.
    pub role: Vec<f64>,
    /// Normalized time predictions: `[dur]` or `[dur, wait]`.
    pub times: Vec<f64>,
}

impl ModelOutput {
    /// Check shapes against the model vocabulary and the time channel count.
    pub fn check_shape(&self, activities: usize, roles: usize, channels: usize) -> Result<(), Error> {
        for (name, dist, width) in [
            ("activity", &self.activity, activities),
            ("role", &self.role, roles),
        ] {
            if dist.len() != width {
                return Err(Error::InvalidDistribution(format!(
                    "{name} distribution has {} entries, the model vocabulary has {width}",
                    dist.len()
                )));
            }
        }
        if self.times.len() < channels {
            return Err(Error::Predictor(format!(
                "model returned {} time values, expected {channels}",
                self.times.len()
            )));
        }
        for (i, t) in self.times.iter().take(channels).enumerate() {
            if !t.is_finite() {
                let field = if i == 0 { "dur_pred" } else { "wait_pred" };
                return Err(Error::NonFinite {
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Sequence model interface.
pub trait Predictor: Send + Sync {
    /// Predictor name used in logs.
    fn name(&self) -> &str {
        "predictor"
    }

    fn predict(&self, request: &PredictionRequest<'_>) -> Result<ModelOutput, PredictorError>;
}

impl<F> Predictor for F
where
    F: Fn(&PredictionRequest<'_>) -> Result<ModelOutput, PredictorError> + Send + Sync,
{
    fn name(&self) -> &str {
        "closure"
    }

    fn predict(&self, request: &PredictionRequest<'_>) -> Result<ModelOutput, PredictorError> {
        self(request)
    }
}

/// One line of a replay file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReplayRecord {
    pub caseid: CaseId,
    pub pref_size: usize,
    #[serde(flatten)]
    pub output: ModelOutput,
}

/// Predictor backed by recorded model outputs keyed by case and prefix size.
#[derive(Debug, Default)]
pub struct ReplayPredictor {
    outputs: HashMap<(CaseId, usize), ModelOutput>,
}

impl ReplayPredictor {
    pub fn from_file(path: &Path) -> Result<Self, PredictorError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Parse JSONL. Blank lines are skipped; a repeated key is an error.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, PredictorError> {
        let mut outputs = HashMap::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: ReplayRecord =
                serde_json::from_str(&line).map_err(|e| PredictorError::Replay {
                    line: i + 1,
                    message: e.to_string(),
                })?;
            let key = (record.caseid, record.pref_size);
            if outputs.contains_key(&key) {
                return Err(PredictorError::Replay {
                    line: i + 1,
                    message: format!("duplicate entry for case {} prefix {}", key.0, key.1),
                });
            }
            outputs.insert(key, record.output);
        }
        Ok(Self { outputs })
    }

    pub fn insert(&mut self, case_id: CaseId, prefix_len: usize, output: ModelOutput) {
        self.outputs.insert((case_id, prefix_len), output);
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl Predictor for ReplayPredictor {
    fn name(&self) -> &str {
        "replay"
    }

    fn predict(&self, request: &PredictionRequest<'_>) -> Result<ModelOutput, PredictorError> {
        self.outputs
            .get(&(request.case_id.clone(), request.prefix_len))
            .cloned()
            .ok_or_else(|| PredictorError::Missing {
                case_id: request.case_id.clone(),
                prefix_len: request.prefix_len,
            })
    }
}
