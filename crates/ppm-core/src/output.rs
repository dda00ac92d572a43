//! Rendering of batch results and ingest reports.
//!
//! JSON writes one document, JSONL one record per line, CSV a header plus
//! one row per record with list cells rendered as `[a, b]`, and summary a
//! single line.

use std::io::Write;

use chrono::NaiveDateTime;
use ppm_common::{CaseId, Error, OutputFormat, Result, SCHEMA_VERSION};
use serde::Serialize;
use serde_json::Value;

use crate::ingest::EventLog;
use crate::pipeline::BatchOutput;
use crate::record::{ResultRecord, Timing};

const LEADING_COLUMNS: &[&str] = &[
    "caseid",
    "ac_prefix",
    "ac_expect",
    "ac_pred",
    "ac_prob",
    "rl_prefix",
    "rl_expect",
    "rl_pred",
    "rl_prob",
    "pref_size",
];
const SINGLE_COLUMNS: &[&str] = &["tm_prefix", "tm_expect", "tm_pred"];
const DUAL_COLUMNS: &[&str] = &[
    "dur_prefix",
    "dur_expect",
    "dur_pred",
    "wait_prefix",
    "wait_expect",
    "wait_pred",
];
const TRAILING_COLUMNS: &[&str] = &["end_timestamp_expected", "end_timestamp_pred"];

/// CSV header for records of the given timestamp mode.
pub fn csv_columns(one_timestamp: bool) -> Vec<&'static str> {
    let timing = if one_timestamp {
        SINGLE_COLUMNS
    } else {
        DUAL_COLUMNS
    };
    [LEADING_COLUMNS, timing, TRAILING_COLUMNS].concat()
}

pub fn write_batch<W: Write + ?Sized>(out: &mut W, batch: &BatchOutput, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, batch)?;
            writeln!(out)?;
        }
        OutputFormat::Jsonl => write_jsonl(out, &batch.records)?,
        OutputFormat::Csv => write_csv(out, &batch.records)?,
        OutputFormat::Summary => {
            let s = &batch.summary;
            writeln!(
                out,
                "{}: {} records from {}/{} cases ({}, n={}), {} failed",
                s.run_id,
                s.records,
                s.cases.succeeded,
                s.cases.total,
                s.variant,
                s.prediction_count,
                s.cases.failed
            )?;
        }
    }
    Ok(())
}

pub fn write_jsonl<W: Write + ?Sized, T: Serialize>(out: &mut W, items: &[T]) -> Result<()> {
    for item in items {
        serde_json::to_writer(&mut *out, item)?;
        writeln!(out)?;
    }
    Ok(())
}

/// Timing columns follow the first record; an empty batch gets the
/// single-timestamp header.
pub fn write_csv<W: Write + ?Sized>(out: &mut W, records: &[ResultRecord]) -> Result<()> {
    let one_timestamp = !matches!(
        records.first().map(|r| &r.timing),
        Some(Timing::Dual { .. })
    );
    let columns = csv_columns(one_timestamp);
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&columns).map_err(csv_error)?;
    for record in records {
        let value = serde_json::to_value(record)?;
        let row: Vec<String> = columns
            .iter()
            .map(|c| value.get(*c).map(cell).unwrap_or_default())
            .collect();
        writer.write_record(&row).map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_error(err: csv::Error) -> Error {
    Error::Io(std::io::Error::from(err))
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(cell).collect();
            format!("[{}]", inner.join(", "))
        }
        other => other.to_string(),
    }
}

/// Overview of an ingested log.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub schema_version: String,
    pub source: String,
    pub one_timestamp: bool,
    pub cases: usize,
    pub events: usize,
    pub shortest_case: usize,
    pub longest_case: usize,
    pub traces: Vec<CaseOverview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseOverview {
    pub caseid: CaseId,
    /// Real events, sentinels excluded.
    pub events: usize,
    pub activities: Vec<String>,
    pub first_event: NaiveDateTime,
    pub last_event: NaiveDateTime,
}

impl IngestReport {
    pub fn from_log(source: &str, log: &EventLog) -> Self {
        let traces: Vec<CaseOverview> = log
            .traces()
            .map(|t| {
                let events = t.events();
                CaseOverview {
                    caseid: t.case_id.clone(),
                    events: t.real_len(),
                    activities: t.real_events().iter().map(|e| e.task.clone()).collect(),
                    first_event: events[0].end_timestamp,
                    last_event: events[events.len() - 1].end_timestamp,
                }
            })
            .collect();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            source: source.to_string(),
            one_timestamp: log.one_timestamp,
            cases: log.len(),
            events: log.event_count(),
            shortest_case: traces.iter().map(|t| t.events).min().unwrap_or(0),
            longest_case: traces.iter().map(|t| t.events).max().unwrap_or(0),
            traces,
        }
    }

    pub fn write<W: Write + ?Sized>(&self, out: &mut W, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *out, self)?;
                writeln!(out)?;
            }
            OutputFormat::Jsonl => write_jsonl(out, &self.traces)?,
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(out);
                writer
                    .write_record(["caseid", "events", "activities", "first_event", "last_event"])
                    .map_err(csv_error)?;
                for t in &self.traces {
                    writer
                        .write_record([
                            t.caseid.to_string(),
                            t.events.to_string(),
                            format!("[{}]", t.activities.join(", ")),
                            t.first_event.to_string(),
                            t.last_event.to_string(),
                        ])
                        .map_err(csv_error)?;
                }
                writer.flush()?;
            }
            OutputFormat::Summary => writeln!(
                out,
                "{}: {} cases, {} events ({}..={} per case)",
                self.source, self.cases, self.events, self.shortest_case, self.longest_case
            )?,
        }
        Ok(())
    }
}
