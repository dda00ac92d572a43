//! Fuzz target for event log ingestion.
//!
//! Arbitrary CSV payloads must yield an event log or an error, in both
//! timestamp modes, without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ppm_config::ReadOptions;
use ppm_core::LogReader;

fuzz_target!(|data: &[u8]| {
    let single = ReadOptions::default();
    let _ = LogReader::new(&single).read_csv(data);

    let dual = ReadOptions {
        one_timestamp: false,
        filter_extraneous_columns: false,
        ..ReadOptions::default()
    };
    if let Ok(log) = LogReader::new(&dual).read_csv(data) {
        let _ = log.raw_traces();
        let _ = log.anchors();
    }
});
