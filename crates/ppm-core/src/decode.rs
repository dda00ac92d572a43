//! Decoding strategies over the model's output distributions.

use ppm_common::{Error, Result};
use ppm_config::{DecodeVariant, RunConfig};
use ppm_math::{argmax, sample, sample_without_replacement, top_k, DistributionError};
use rand::Rng;
use serde::Serialize;

use crate::predictor::ModelOutput;

/// How indices are selected from one distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Highest probability; ties go to the lowest index.
    ArgMax,
    /// One draw using the distribution as a PMF.
    RandomChoice,
    /// The `n` most probable indices, descending; ties by ascending index.
    MultiPred(usize),
    /// `n` distinct draws without replacement.
    MultiPredRand(usize),
}

impl Strategy {
    /// `count` only matters for the multi variants.
    pub fn new(variant: DecodeVariant, count: usize) -> Self {
        match variant {
            DecodeVariant::ArgMax => Strategy::ArgMax,
            DecodeVariant::RandomChoice => Strategy::RandomChoice,
            DecodeVariant::MultiPred => Strategy::MultiPred(count),
            DecodeVariant::MultiPredRand => Strategy::MultiPredRand(count),
        }
    }

    pub fn from_run(run: &RunConfig) -> Self {
        Self::new(run.variant, run.effective_prediction_count())
    }

    pub fn count(&self) -> usize {
        match self {
            Strategy::ArgMax | Strategy::RandomChoice => 1,
            Strategy::MultiPred(n) | Strategy::MultiPredRand(n) => *n,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, Strategy::MultiPred(_) | Strategy::MultiPredRand(_))
    }

    pub fn select<R: Rng + ?Sized>(
        &self,
        probs: &[f64],
        rng: &mut R,
    ) -> std::result::Result<Selection, DistributionError> {
        let indices = match *self {
            Strategy::ArgMax => vec![argmax(probs)?],
            Strategy::RandomChoice => vec![sample(probs, rng)?],
            Strategy::MultiPred(n) => top_k(probs, n)?,
            Strategy::MultiPredRand(n) => sample_without_replacement(probs, n, rng)?,
        };
        Ok(Selection::new(indices, probs))
    }
}

/// Chosen index with its probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pick {
    pub index: usize,
    pub probability: f64,
}

/// Indices picked from one distribution, in selection order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub picks: Vec<Pick>,
}

impl Selection {
    fn new(indices: Vec<usize>, probs: &[f64]) -> Self {
        let picks = indices
            .into_iter()
            .map(|index| Pick {
                index,
                probability: probs[index],
            })
            .collect();
        Self { picks }
    }

    /// The first pick: the most probable for the deterministic strategies.
    pub fn top(&self) -> Option<Pick> {
        self.picks.first().copied()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.picks.iter().map(|p| p.index).collect()
    }

    pub fn probabilities(&self) -> Vec<f64> {
        self.picks.iter().map(|p| p.probability).collect()
    }
}

/// Selections for both categorical channels of one model output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decoded {
    pub activity: Selection,
    pub role: Selection,
}

/// Applies one strategy to both channels.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    strategy: Strategy,
}

impl Decoder {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn decode<R: Rng + ?Sized>(&self, output: &ModelOutput, rng: &mut R) -> Result<Decoded> {
        let activity = self
            .strategy
            .select(&output.activity, rng)
            .map_err(|e| channel_error("activity", e))?;
        let role = self
            .strategy
            .select(&output.role, rng)
            .map_err(|e| channel_error("role", e))?;
        Ok(Decoded { activity, role })
    }
}

fn channel_error(channel: &str, err: DistributionError) -> Error {
    match err {
        DistributionError::InsufficientSupport { .. } => Error::from(err),
        other => Error::InvalidDistribution(format!("{channel}: {other}")),
    }
}
