//! Structured event definitions for logging.
//!
//! Events follow a consistent schema for machine-parseable JSONL output.
//! Every event carries the run id and the pipeline stage it came from.

use chrono::{DateTime, Utc};
use ppm_common::RunId;
use serde::{Deserialize, Serialize};

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Stages of the batch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Reading the event log into case traces.
    Ingest,
    /// Building feature windows from prefixes.
    Encode,
    /// Calling the external predictor.
    Predict,
    /// Selecting indices from output distributions.
    Decode,
    /// Chaining deltas into absolute timestamps.
    Reconstruct,
    /// Writing result records.
    Output,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Ingest => "ingest",
            Stage::Encode => "encode",
            Stage::Predict => "predict",
            Stage::Decode => "decode",
            Stage::Reconstruct => "reconstruct",
            Stage::Output => "output",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names, used as tracing targets.
pub mod event_names {
    // Config/init events
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";

    // Ingest stage
    pub const INGEST_STARTED: &str = "ingest.started";
    pub const INGEST_ROWS_DROPPED: &str = "ingest.rows_dropped";
    pub const INGEST_FINISHED: &str = "ingest.finished";

    // Batch lifecycle
    pub const BATCH_STARTED: &str = "batch.started";
    pub const BATCH_CASE_DONE: &str = "batch.case_done";
    pub const BATCH_CASE_SKIPPED: &str = "batch.case_skipped";
    pub const BATCH_CANCELLED: &str = "batch.cancelled";
    pub const BATCH_FINISHED: &str = "batch.finished";

    // Output stage
    pub const OUTPUT_WRITTEN: &str = "output.written";
}

/// A structured log event as written to JSONL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,

    pub level: Level,

    /// Event name (e.g., "batch.started"); the tracing target.
    pub event: String,

    /// Id of this invocation, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Additional structured fields.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl LogEvent {
    pub fn new(level: Level, event: impl Into<String>) -> Self {
        LogEvent {
            ts: Utc::now(),
            level,
            event: event.into(),
            run_id: None,
            stage: None,
            message: None,
            fields: serde_json::Map::new(),
        }
    }

    /// Add a field to the event.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.into(), v);
        }
        self
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.event
            )
        })
    }
}

/// Correlation context shared by every event of one run.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: RunId,
}

impl LogContext {
    pub fn new(run_id: RunId) -> Self {
        LogContext { run_id }
    }

    /// A span tagging every event emitted inside it with this run and `stage`.
    pub fn span(&self, stage: Stage) -> tracing::Span {
        tracing::info_span!("ppm", run_id = %self.run_id, stage = %stage)
    }
}
