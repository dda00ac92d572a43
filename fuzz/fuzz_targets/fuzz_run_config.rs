//! Fuzz target for run configuration parsing in every supported format.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ppm_config::run::ConfigFormat;
use ppm_config::RunConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    for format in [ConfigFormat::Toml, ConfigFormat::Yaml, ConfigFormat::Json] {
        if let Ok(run) = RunConfig::from_str_with_format(text, format) {
            let _ = run.effective_prediction_count();
        }
    }
});
