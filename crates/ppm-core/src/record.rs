//! Per-prefix result records.

use chrono::NaiveDateTime;
use ppm_common::{CaseId, Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::decode::{Decoded, Selection};
use crate::predictor::ModelOutput;
use crate::prefix::{FeatureSpec, Step};
use crate::rescale::TimeChannel;

/// A single prediction, or `multiprednum` of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    fn from_vec(mut items: Vec<T>, multi: bool) -> Self {
        if !multi && items.len() == 1 {
            OneOrMany::One(items.remove(0))
        } else {
            OneOrMany::Many(items)
        }
    }

    pub fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(items) => items.first(),
        }
    }
}

/// Rescaled time values in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Timing {
    Dual {
        dur_prefix: Vec<f64>,
        dur_expect: Option<f64>,
        dur_pred: f64,
        wait_prefix: Vec<f64>,
        wait_expect: Option<f64>,
        wait_pred: f64,
    },
    Single {
        tm_prefix: Vec<f64>,
        tm_expect: Option<f64>,
        tm_pred: f64,
    },
}

impl Timing {
    /// Seconds the expected track advances; zero without a next event.
    pub fn expected_delta(&self) -> f64 {
        match self {
            Timing::Single { tm_expect, .. } => tm_expect.unwrap_or(0.0),
            Timing::Dual {
                dur_expect,
                wait_expect,
                ..
            } => dur_expect.unwrap_or(0.0) + wait_expect.unwrap_or(0.0),
        }
    }

    pub fn predicted_delta(&self) -> f64 {
        match self {
            Timing::Single { tm_pred, .. } => *tm_pred,
            Timing::Dual {
                dur_pred, wait_pred, ..
            } => dur_pred + wait_pred,
        }
    }
}

/// Outcome of one model call on one prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResultRecord {
    pub caseid: CaseId,
    pub ac_prefix: Vec<String>,
    pub ac_expect: Option<String>,
    pub ac_pred: OneOrMany<String>,
    pub ac_prob: OneOrMany<f64>,
    pub rl_prefix: Vec<String>,
    pub rl_expect: Option<String>,
    pub rl_pred: OneOrMany<String>,
    pub rl_prob: OneOrMany<f64>,
    pub pref_size: usize,
    #[serde(flatten)]
    pub timing: Timing,
    pub end_timestamp_expected: Option<NaiveDateTime>,
    pub end_timestamp_pred: Option<NaiveDateTime>,
}

impl FeatureSpec {
    /// Assemble the record for `prefix`: labels from the vocabularies and
    /// every time value rescaled to seconds. Timestamps are filled later.
    pub fn record(
        &self,
        case_id: &CaseId,
        prefix: &[Step],
        next: Option<&Step>,
        decoded: &Decoded,
        output: &ModelOutput,
        multi: bool,
    ) -> Result<ResultRecord> {
        let ac = |i: usize| self.activities.label(i).unwrap_or_default().to_string();
        let rl = |i: usize| self.roles.label(i).unwrap_or_default().to_string();
        let labels = |sel: &Selection, f: &dyn Fn(usize) -> String| {
            OneOrMany::from_vec(sel.indices().into_iter().map(f).collect(), multi)
        };

        let timing = if self.one_timestamp {
            let (tm_prefix, tm_expect, tm_pred) =
                self.channel(TimeChannel::Duration, 0, prefix, next, output)?;
            Timing::Single {
                tm_prefix,
                tm_expect,
                tm_pred,
            }
        } else {
            let (dur_prefix, dur_expect, dur_pred) =
                self.channel(TimeChannel::Duration, 0, prefix, next, output)?;
            let (wait_prefix, wait_expect, wait_pred) =
                self.channel(TimeChannel::Wait, 1, prefix, next, output)?;
            Timing::Dual {
                dur_prefix,
                dur_expect,
                dur_pred,
                wait_prefix,
                wait_expect,
                wait_pred,
            }
        };

        Ok(ResultRecord {
            caseid: case_id.clone(),
            ac_prefix: prefix.iter().map(|s| ac(s.activity)).collect(),
            ac_expect: next.map(|s| ac(s.activity)),
            ac_pred: labels(&decoded.activity, &ac),
            ac_prob: OneOrMany::from_vec(decoded.activity.probabilities(), multi),
            rl_prefix: prefix.iter().map(|s| rl(s.role)).collect(),
            rl_expect: next.map(|s| rl(s.role)),
            rl_pred: labels(&decoded.role, &rl),
            rl_prob: OneOrMany::from_vec(decoded.role.probabilities(), multi),
            pref_size: prefix.len(),
            timing,
            end_timestamp_expected: None,
            end_timestamp_pred: None,
        })
    }

    /// Prefix, expected and predicted values of one time channel, in seconds.
    fn channel(
        &self,
        channel: TimeChannel,
        column: usize,
        prefix: &[Step],
        next: Option<&Step>,
        output: &ModelOutput,
    ) -> Result<(Vec<f64>, Option<f64>, f64)> {
        let rescale = |v: f64| self.scaler.rescale(channel, v);
        let history = prefix
            .iter()
            .map(|s| rescale(s.times[column]))
            .collect::<Result<Vec<_>>>()?;
        let expected = next.map(|s| rescale(s.times[column])).transpose()?;
        let predicted = rescale(output.times[column])?;
        if !predicted.is_finite() {
            return Err(Error::NonFinite {
                field: channel.predicted_field(self.one_timestamp).to_string(),
            });
        }
        Ok((history, expected, predicted))
    }
}
