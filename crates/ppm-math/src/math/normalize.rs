//! Normalization of continuous time features and its inverse.
//!
//! A sequence model is trained on normalized durations and waiting times.
//! [`normalize`] applies the training-time transform, [`rescale`] maps a
//! model output back to real units (seconds). The pair is an exact inverse
//! for every method except `max`, whose inverse rounds to the nearest
//! integer (ties to even).
//!
//! | method     | normalize                          | rescale                               |
//! |------------|------------------------------------|---------------------------------------|
//! | `lognorm`  | `(ln1p(x) - min) / (max - min)`    | `expm1(v * (max - min) + min)`        |
//! | `normal`   | `(x - min) / (max - min)`          | `v * (max - min) + min`               |
//! | `standard` | `(x - mean) / std`                 | `v * std + mean`                      |
//! | `max`      | `x / max`                          | `round(v * max)`                      |
//! | identity   | `x`                                | `v`                                   |

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from normalization and rescaling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScaleError {
    #[error("unknown normalization method: {0}")]
    UnknownMethod(String),

    #[error("scale argument '{field}' is required by method '{method}'")]
    MissingArgument {
        method: NormMethod,
        field: &'static str,
    },

    #[error("degenerate scale arguments for method '{method}': {message}")]
    DegenerateRange { method: NormMethod, message: String },
}

/// Normalization method used at training time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NormMethod {
    /// Min-max scaling of `ln(1 + x)`.
    Lognorm,
    /// Min-max scaling.
    Normal,
    /// Z-score standardization.
    Standard,
    /// Division by the maximum.
    Max,
    /// No normalization.
    #[default]
    Identity,
}

impl NormMethod {
    /// Parse an optional method name as stored in a model parameter file.
    ///
    /// `None`, `"none"` and `"None"` all select [`NormMethod::Identity`].
    pub fn parse(name: Option<&str>) -> Result<Self, ScaleError> {
        match name {
            None => Ok(NormMethod::Identity),
            Some(s) => s.parse(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NormMethod::Lognorm => "lognorm",
            NormMethod::Normal => "normal",
            NormMethod::Standard => "standard",
            NormMethod::Max => "max",
            NormMethod::Identity => "none",
        }
    }
}

impl FromStr for NormMethod {
    type Err = ScaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lognorm" => Ok(NormMethod::Lognorm),
            "normal" => Ok(NormMethod::Normal),
            "standard" => Ok(NormMethod::Standard),
            "max" => Ok(NormMethod::Max),
            "none" | "None" | "" => Ok(NormMethod::Identity),
            other => Err(ScaleError::UnknownMethod(other.to_string())),
        }
    }
}

impl fmt::Display for NormMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-feature normalization parameters.
///
/// Only the fields required by the active method need to be present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScaleArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
}

impl ScaleArgs {
    pub fn min_max(min_value: f64, max_value: f64) -> Self {
        Self {
            max_value: Some(max_value),
            min_value: Some(min_value),
            ..Self::default()
        }
    }

    pub fn mean_std(mean: f64, std: f64) -> Self {
        Self {
            mean: Some(mean),
            std: Some(std),
            ..Self::default()
        }
    }

    pub fn max(max_value: f64) -> Self {
        Self {
            max_value: Some(max_value),
            ..Self::default()
        }
    }

    fn field(value: Option<f64>, method: NormMethod, field: &'static str) -> Result<f64, ScaleError> {
        value.ok_or(ScaleError::MissingArgument { method, field })
    }

    fn bounds(&self, method: NormMethod) -> Result<(f64, f64), ScaleError> {
        let min = Self::field(self.min_value, method, "min_value")?;
        let max = Self::field(self.max_value, method, "max_value")?;
        Ok((min, max))
    }

    /// Check that the arguments are usable for `method` in both directions.
    pub fn check(&self, method: NormMethod) -> Result<(), ScaleError> {
        match method {
            NormMethod::Lognorm | NormMethod::Normal => {
                let (min, max) = self.bounds(method)?;
                if !(max - min).is_normal() {
                    return Err(ScaleError::DegenerateRange {
                        method,
                        message: format!("max_value ({max}) must differ from min_value ({min})"),
                    });
                }
            }
            NormMethod::Standard => {
                Self::field(self.mean, method, "mean")?;
                let std = Self::field(self.std, method, "std")?;
                if !std.is_normal() {
                    return Err(ScaleError::DegenerateRange {
                        method,
                        message: format!("std must be non-zero and finite, got {std}"),
                    });
                }
            }
            NormMethod::Max => {
                let max = Self::field(self.max_value, method, "max_value")?;
                if !max.is_normal() {
                    return Err(ScaleError::DegenerateRange {
                        method,
                        message: format!("max_value must be non-zero and finite, got {max}"),
                    });
                }
            }
            NormMethod::Identity => {}
        }
        Ok(())
    }
}

/// Map a normalized model output back to real units.
pub fn rescale(value: f64, method: NormMethod, args: &ScaleArgs) -> Result<f64, ScaleError> {
    let out = match method {
        NormMethod::Lognorm => {
            let (min, max) = args.bounds(method)?;
            (value * (max - min) + min).exp_m1()
        }
        NormMethod::Normal => {
            let (min, max) = args.bounds(method)?;
            value * (max - min) + min
        }
        NormMethod::Standard => {
            let mean = ScaleArgs::field(args.mean, method, "mean")?;
            let std = ScaleArgs::field(args.std, method, "std")?;
            value * std + mean
        }
        NormMethod::Max => {
            let max = ScaleArgs::field(args.max_value, method, "max_value")?;
            (value * max).round_ties_even()
        }
        NormMethod::Identity => value,
    };
    Ok(out)
}

/// [`rescale`] with the method given by name, as stored in parameter files.
pub fn rescale_named(value: f64, method: Option<&str>, args: &ScaleArgs) -> Result<f64, ScaleError> {
    rescale(value, NormMethod::parse(method)?, args)
}

/// Apply the training-time normalization to a real value.
pub fn normalize(value: f64, method: NormMethod, args: &ScaleArgs) -> Result<f64, ScaleError> {
    args.check(method)?;
    let out = match method {
        NormMethod::Lognorm => {
            let (min, max) = args.bounds(method)?;
            (value.ln_1p() - min) / (max - min)
        }
        NormMethod::Normal => {
            let (min, max) = args.bounds(method)?;
            (value - min) / (max - min)
        }
        NormMethod::Standard => {
            let mean = ScaleArgs::field(args.mean, method, "mean")?;
            let std = ScaleArgs::field(args.std, method, "std")?;
            (value - mean) / std
        }
        NormMethod::Max => {
            let max = ScaleArgs::field(args.max_value, method, "max_value")?;
            value / max
        }
        NormMethod::Identity => value,
    };
    Ok(out)
}
