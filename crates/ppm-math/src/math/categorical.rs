//! Selection primitives over categorical probability mass functions.
//!
//! These back the four decoding strategies: deterministic argmax and top-k,
//! and sampling with or without replacement.

use rand::Rng;
use thiserror::Error;

/// Allowed deviation of a PMF's total mass from 1.
pub const PMF_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributionError {
    #[error("distribution is empty")]
    Empty,

    #[error("negative probability mass {value} at index {index}")]
    NegativeMass { index: usize, value: f64 },

    #[error("non-finite probability at index {index}")]
    NonFinite { index: usize },

    #[error("probabilities sum to {sum}, expected 1")]
    NotNormalized { sum: f64 },

    #[error("cannot draw {requested} distinct indices from {available} with nonzero mass")]
    InsufficientSupport { requested: usize, available: usize },
}

fn check_finite(probs: &[f64]) -> Result<(), DistributionError> {
    if probs.is_empty() {
        return Err(DistributionError::Empty);
    }
    if let Some(index) = probs.iter().position(|p| !p.is_finite()) {
        return Err(DistributionError::NonFinite { index });
    }
    Ok(())
}

/// Check that `probs` is a valid PMF: non-empty, finite, non-negative, and
/// summing to 1 within [`PMF_TOLERANCE`].
pub fn validate_pmf(probs: &[f64]) -> Result<(), DistributionError> {
    check_finite(probs)?;
    if let Some((index, &value)) = probs.iter().enumerate().find(|(_, p)| **p < 0.0) {
        return Err(DistributionError::NegativeMass { index, value });
    }
    let sum: f64 = probs.iter().sum();
    if (sum - 1.0).abs() > PMF_TOLERANCE {
        return Err(DistributionError::NotNormalized { sum });
    }
    Ok(())
}

/// Index of the largest probability. Ties resolve to the lowest index.
pub fn argmax(probs: &[f64]) -> Result<usize, DistributionError> {
    check_finite(probs)?;
    let mut best = 0;
    for (i, &p) in probs.iter().enumerate().skip(1) {
        if p > probs[best] {
            best = i;
        }
    }
    Ok(best)
}

/// The `k` most probable indices in descending probability order.
///
/// Equal probabilities keep ascending index order.
pub fn top_k(probs: &[f64], k: usize) -> Result<Vec<usize>, DistributionError> {
    check_finite(probs)?;
    if k > probs.len() {
        return Err(DistributionError::InsufficientSupport {
            requested: k,
            available: probs.len(),
        });
    }
    let mut order: Vec<usize> = (0..probs.len()).collect();
    // stable: ties stay in index order
    order.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));
    order.truncate(k);
    Ok(order)
}

/// Inverse-CDF draw over `weights`, skipping zero-mass entries.
///
/// `total` must be the positive sum of `weights`.
fn draw<R: Rng + ?Sized>(weights: &[f64], total: f64, rng: &mut R) -> usize {
    let target = rng.random::<f64>() * total;
    let mut acc = 0.0;
    let mut last_nonzero = 0;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        last_nonzero = i;
        acc += w;
        if target < acc {
            return i;
        }
    }
    // rounding left target at or past the final bucket
    last_nonzero
}

/// Sample one index using `probs` as a PMF.
pub fn sample<R: Rng + ?Sized>(probs: &[f64], rng: &mut R) -> Result<usize, DistributionError> {
    validate_pmf(probs)?;
    let total: f64 = probs.iter().sum();
    Ok(draw(probs, total, rng))
}

/// Sample `k` distinct indices without replacement, each draw proportional
/// to the remaining mass.
pub fn sample_without_replacement<R: Rng + ?Sized>(
    probs: &[f64],
    k: usize,
    rng: &mut R,
) -> Result<Vec<usize>, DistributionError> {
    validate_pmf(probs)?;
    let available = probs.iter().filter(|&&p| p > 0.0).count();
    if k > available {
        return Err(DistributionError::InsufficientSupport {
            requested: k,
            available,
        });
    }
    let mut weights = probs.to_vec();
    let mut picked = Vec::with_capacity(k);
    for _ in 0..k {
        let total: f64 = weights.iter().sum();
        let idx = draw(&weights, total, rng);
        weights[idx] = 0.0;
        picked.push(idx);
    }
    Ok(picked)
}
