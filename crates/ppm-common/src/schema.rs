//! Schema versioning for persisted and emitted documents.

/// Version stamped on run summaries and expected in parameter files.
pub const SCHEMA_VERSION: &str = "1.0.0";
