//! Fuzz target for decoding strategies.
//!
//! Any distribution, including non-finite or negative entries, must be
//! decoded or rejected without panicking.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ppm_core::decode::Strategy;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Arbitrary)]
struct Input {
    probs: Vec<f64>,
    count: u8,
    seed: u64,
}

fuzz_target!(|input: Input| {
    let count = usize::from(input.count);
    let mut rng = StdRng::seed_from_u64(input.seed);
    for strategy in [
        Strategy::ArgMax,
        Strategy::RandomChoice,
        Strategy::MultiPred(count),
        Strategy::MultiPredRand(count),
    ] {
        if let Ok(selection) = strategy.select(&input.probs, &mut rng) {
            assert!(selection.indices().iter().all(|&i| i < input.probs.len()));
        }
    }
});
