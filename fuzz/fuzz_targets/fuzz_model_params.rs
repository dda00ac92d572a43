//! Fuzz target for model parameter files.
//!
//! Parsing, validation and plan construction must reject bad parameters
//! with an error, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ppm_config::{validate, ModelParameters, RunConfig};
use ppm_core::BatchPlan;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(params) = ModelParameters::from_str(text) else {
        return;
    };
    if validate::validate_params(&params).is_ok() {
        let _ = BatchPlan::new(&params, &RunConfig::default());
    }
});
