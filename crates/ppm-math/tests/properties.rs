//! Property-based tests for ppm-math.
//!
//! Uses proptest to check normalization round-trips and selection invariants
//! across many random inputs.

use ppm_math::{
    argmax, normalize, rescale, sample, sample_without_replacement, top_k, NormMethod, ScaleArgs,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Relative tolerance for round-trips.
const TOL: f64 = 1e-9;

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return false;
    }
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

/// A normalized PMF with at least one zero entry mixed in.
fn pmf_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(prop_oneof![Just(0.0), 0.01..10.0f64], 2..12)
        .prop_filter("needs some mass", |w| w.iter().any(|&x| x > 0.0))
        .prop_map(|w| {
            let total: f64 = w.iter().sum();
            w.into_iter().map(|x| x / total).collect()
        })
}

// ============================================================================
// normalize / rescale round-trips
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn lognorm_round_trip(x in 0.0..1.0e7f64, lo in 0.0..2.0f64, span in 0.5..20.0f64) {
        let args = ScaleArgs::min_max(lo, lo + span);
        let v = normalize(x, NormMethod::Lognorm, &args).unwrap();
        let back = rescale(v, NormMethod::Lognorm, &args).unwrap();
        prop_assert!(approx_eq(back, x, 1e-6), "x={} back={}", x, back);
    }

    #[test]
    fn normal_round_trip(x in -1.0e6..1.0e6f64, lo in -1.0e3..1.0e3f64, span in 1.0..1.0e6f64) {
        let args = ScaleArgs::min_max(lo, lo + span);
        let v = normalize(x, NormMethod::Normal, &args).unwrap();
        let back = rescale(v, NormMethod::Normal, &args).unwrap();
        prop_assert!(approx_eq(back, x, TOL), "x={} back={}", x, back);
    }

    #[test]
    fn standard_round_trip(x in -1.0e6..1.0e6f64, mean in -1.0e4..1.0e4f64, std in 0.1..1.0e4f64) {
        let args = ScaleArgs::mean_std(mean, std);
        let v = normalize(x, NormMethod::Standard, &args).unwrap();
        let back = rescale(v, NormMethod::Standard, &args).unwrap();
        prop_assert!(approx_eq(back, x, TOL), "x={} back={}", x, back);
    }

    /// `max` rounds on the way back, so integer-valued inputs round-trip exactly.
    #[test]
    fn max_round_trip_on_integers(x in 0u32..1_000_000, max in 1.0..1.0e7f64) {
        let x = f64::from(x);
        let args = ScaleArgs::max(max);
        let v = normalize(x, NormMethod::Max, &args).unwrap();
        let back = rescale(v, NormMethod::Max, &args).unwrap();
        prop_assert_eq!(back, x);
    }

    #[test]
    fn identity_round_trip(x in -1.0e9..1.0e9f64) {
        let args = ScaleArgs::default();
        let v = normalize(x, NormMethod::Identity, &args).unwrap();
        prop_assert_eq!(rescale(v, NormMethod::Identity, &args).unwrap(), x);
    }
}

// ============================================================================
// selection invariants
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn argmax_is_global_max(probs in pmf_strategy()) {
        let i = argmax(&probs).unwrap();
        prop_assert!(probs.iter().all(|&p| p <= probs[i]));
        prop_assert!(probs[..i].iter().all(|&p| p < probs[i]), "not first occurrence");
    }

    #[test]
    fn top_k_descending_and_distinct(probs in pmf_strategy(), k in 1usize..12) {
        let k = k.min(probs.len());
        let picks = top_k(&probs, k).unwrap();
        prop_assert_eq!(picks.len(), k);
        for pair in picks.windows(2) {
            prop_assert!(probs[pair[0]] >= probs[pair[1]]);
            if probs[pair[0]] == probs[pair[1]] {
                prop_assert!(pair[0] < pair[1]);
            }
        }
        prop_assert_eq!(picks[0], argmax(&probs).unwrap());
    }

    #[test]
    fn sample_avoids_zero_mass(probs in pmf_strategy(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..16 {
            let i = sample(&probs, &mut rng).unwrap();
            prop_assert!(probs[i] > 0.0);
        }
    }

    #[test]
    fn without_replacement_is_distinct(probs in pmf_strategy(), seed in any::<u64>(), k in 1usize..12) {
        let support = probs.iter().filter(|&&p| p > 0.0).count();
        let mut rng = StdRng::seed_from_u64(seed);
        let result = sample_without_replacement(&probs, k, &mut rng);
        if k > support {
            prop_assert!(result.is_err());
        } else {
            let picks = result.unwrap();
            prop_assert_eq!(picks.len(), k);
            prop_assert!(picks.iter().all(|&i| probs[i] > 0.0));
            let mut dedup = picks.clone();
            dedup.sort_unstable();
            dedup.dedup();
            prop_assert_eq!(dedup.len(), k);
        }
    }
}
