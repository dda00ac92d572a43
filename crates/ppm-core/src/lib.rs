//! Predictive process monitoring core library.
//!
//! This library provides the batch prediction pipeline:
//! - Event log ingestion into sentinel-bounded case traces
//! - Prefix features and fixed-width feature windows
//! - The predictor seam and a replay predictor
//! - Decoding strategies, rescaling and timestamp reconstruction
//! - The batch engine, result output and JSON schemas
//! - Exit codes and structured logging for the CLI
//!
//! The binary entry point is in `main.rs`.

pub mod decode;
pub mod encode;
pub mod exit_codes;
pub mod filter;
pub mod ingest;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod predictor;
pub mod prefix;
pub mod reconstruct;
pub mod record;
pub mod rescale;
pub mod schema;

pub use decode::{Decoder, Selection, Strategy};
pub use encode::FeatureWindow;
pub use ingest::{CaseTrace, EventLog, LogReader};
pub use pipeline::{BatchEngine, BatchOutput, BatchPlan, CancelToken, RunSummary};
pub use predictor::{ModelOutput, PredictionRequest, Predictor, PredictorError, ReplayPredictor};
pub use record::ResultRecord;
