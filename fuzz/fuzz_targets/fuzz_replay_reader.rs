//! Fuzz target for replay prediction files (JSONL).

#![no_main]

use libfuzzer_sys::fuzz_target;
use ppm_core::ReplayPredictor;

fuzz_target!(|data: &[u8]| {
    let _ = ReplayPredictor::from_reader(data);
});
