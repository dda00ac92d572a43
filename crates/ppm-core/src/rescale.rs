//! Time-channel scaling: the model's normalization applied per channel.

use ppm_common::{Error, Result};
use ppm_config::ModelParameters;
use ppm_math::{normalize, rescale, NormMethod, ScaleArgs};
use serde::Serialize;

/// Continuous channel of a time feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeChannel {
    Duration,
    Wait,
}

impl TimeChannel {
    /// Channels present in the given timestamp mode, in feature order.
    pub fn for_mode(one_timestamp: bool) -> &'static [TimeChannel] {
        if one_timestamp {
            &[TimeChannel::Duration]
        } else {
            &[TimeChannel::Duration, TimeChannel::Wait]
        }
    }

    /// Output column holding this channel's prediction.
    pub fn predicted_field(self, one_timestamp: bool) -> &'static str {
        match (self, one_timestamp) {
            (TimeChannel::Duration, true) => "tm_pred",
            (TimeChannel::Duration, false) => "dur_pred",
            (TimeChannel::Wait, _) => "wait_pred",
        }
    }
}

/// Normalization method plus the scale arguments of each channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScaler {
    method: NormMethod,
    dur: ScaleArgs,
    wait: Option<ScaleArgs>,
}

impl TimeScaler {
    pub fn new(method: NormMethod, dur: ScaleArgs, wait: Option<ScaleArgs>) -> Self {
        Self { method, dur, wait }
    }

    /// Dual-timestamp models without separate wait args (identity
    /// normalization) reuse the duration args for the wait channel.
    pub fn from_params(params: &ModelParameters) -> Result<Self> {
        let dur = *params.scale_args.dur();
        let wait = match params.scale_args.wait() {
            Some(wait) => Some(*wait),
            None if !params.one_timestamp => Some(dur),
            None => None,
        };
        Ok(Self::new(params.norm()?, dur, wait))
    }

    pub fn method(&self) -> NormMethod {
        self.method
    }

    fn args(&self, channel: TimeChannel) -> Result<&ScaleArgs> {
        match channel {
            TimeChannel::Duration => Ok(&self.dur),
            TimeChannel::Wait => self.wait.as_ref().ok_or_else(|| {
                Error::InvalidConfiguration(
                    "waiting-time channel used without scale_args.wait".to_string(),
                )
            }),
        }
    }

    /// Model units to seconds.
    pub fn rescale(&self, channel: TimeChannel, value: f64) -> Result<f64> {
        Ok(rescale(value, self.method, self.args(channel)?)?)
    }

    /// Seconds to model units.
    pub fn normalize(&self, channel: TimeChannel, value: f64) -> Result<f64> {
        Ok(normalize(value, self.method, self.args(channel)?)?)
    }
}
