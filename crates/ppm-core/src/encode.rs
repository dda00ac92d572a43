//! Fixed-width feature windows over a prefix.

use ppm_config::VectorizerKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::prefix::Step;

/// Model input for one prefix. Every channel is exactly `time_dim` long:
/// the most recent steps, left-padded with zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeatureWindow {
    pub activities: Vec<usize>,
    pub roles: Vec<usize>,
    /// One row per position, one column per time channel.
    pub times: Vec<Vec<f64>>,
    /// Present only for the inter vectorizer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inter: Option<Vec<Vec<f64>>>,
}

impl FeatureWindow {
    pub fn encode(prefix: &[Step], time_dim: usize, vectorizer: VectorizerKind) -> Self {
        let channels = prefix.first().map_or(1, |s| s.times.len());
        let activities = window(prefix.iter().map(|s| s.activity), time_dim, 0);
        let roles = window(prefix.iter().map(|s| s.role), time_dim, 0);
        let times = window(
            prefix.iter().map(|s| s.times.clone()),
            time_dim,
            vec![0.0; channels],
        );
        let inter = match vectorizer {
            VectorizerKind::Basic => None,
            VectorizerKind::Inter => {
                let width = prefix.last().map_or(0, |s| s.inter.len());
                Some(window(
                    prefix.iter().map(|s| s.inter.clone()),
                    time_dim,
                    vec![0.0; width],
                ))
            }
        };
        Self {
            activities,
            roles,
            times,
            inter,
        }
    }

    pub fn time_dim(&self) -> usize {
        self.activities.len()
    }
}

/// The trailing `time_dim` items, left-padded with `pad`.
fn window<T: Clone>(items: impl ExactSizeIterator<Item = T>, time_dim: usize, pad: T) -> Vec<T> {
    let len = items.len();
    let skip = len.saturating_sub(time_dim);
    let mut out = vec![pad; time_dim - (len - skip)];
    out.extend(items.skip(skip));
    out
}
