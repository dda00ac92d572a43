//! Predictive process monitoring common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the ppm crates:
//! - Case and run identity types
//! - Schema versioning
//! - The unified error taxonomy with structured output
//! - Output formats

pub mod error;
pub mod id;
pub mod output;
pub mod schema;

pub use error::{
    format_batch_human, format_error_human, BatchError, BatchResult, Error, ErrorCategory, Result,
    StructuredError,
};
pub use id::{CaseId, RunId};
pub use output::OutputFormat;
pub use schema::SCHEMA_VERSION;
