//! JSON Schema generation for the files ppm reads and the records it writes.
//!
//! ```bash
//! ppm schema --list
//! ppm schema ResultRecord
//! ppm schema --all
//! ```

use schemars::schema_for;
use serde_json::Value;
use std::collections::BTreeMap;

pub use crate::encode::FeatureWindow;
pub use crate::pipeline::{BatchOutput, RunSummary};
pub use crate::predictor::{ModelOutput, ReplayRecord};
pub use crate::record::ResultRecord;
pub use ppm_common::StructuredError;
pub use ppm_config::{ConfigSnapshot, ModelParameters, RunConfig};

/// Available schema types with their descriptions.
pub fn available_schemas() -> Vec<(&'static str, &'static str)> {
    vec![
        // Inputs
        ("ModelParameters", "Training-time parameters of a sequence model"),
        ("RunConfig", "Operational parameters of a batch run"),
        ("ReplayRecord", "One recorded model output (replay JSONL line)"),
        // Model seam
        ("FeatureWindow", "Fixed-width model input for one prefix"),
        ("ModelOutput", "Raw model output for one window"),
        // Outputs
        ("ResultRecord", "Prediction and reconstructed timestamps for one prefix"),
        ("RunSummary", "Counts and provenance of a batch run"),
        ("BatchOutput", "Run summary plus all result records"),
        ("ConfigSnapshot", "Hashes and sources of the loaded configuration"),
        ("StructuredError", "Machine-readable error"),
    ]
}

/// Generate the JSON Schema of a type by name; `None` for unknown names.
pub fn generate_schema(type_name: &str) -> Option<Value> {
    let schema = match type_name {
        "ModelParameters" => schema_for!(ModelParameters),
        "RunConfig" => schema_for!(RunConfig),
        "ReplayRecord" => schema_for!(ReplayRecord),
        "FeatureWindow" => schema_for!(FeatureWindow),
        "ModelOutput" => schema_for!(ModelOutput),
        "ResultRecord" => schema_for!(ResultRecord),
        "RunSummary" => schema_for!(RunSummary),
        "BatchOutput" => schema_for!(BatchOutput),
        "ConfigSnapshot" => schema_for!(ConfigSnapshot),
        "StructuredError" => schema_for!(StructuredError),
        _ => return None,
    };
    Some(schema.to_value())
}

pub fn generate_all_schemas() -> BTreeMap<String, Value> {
    available_schemas()
        .into_iter()
        .filter_map(|(name, _)| generate_schema(name).map(|s| (name.to_string(), s)))
        .collect()
}

/// Schema output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    /// Pretty-printed JSON (default)
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

pub fn format_schema(schema: &Value, format: SchemaFormat) -> String {
    let rendered = match format {
        SchemaFormat::Json => serde_json::to_string_pretty(schema),
        SchemaFormat::JsonCompact => serde_json::to_string(schema),
    };
    // a Value always serializes
    rendered.unwrap_or_default()
}
