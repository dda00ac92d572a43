//! Event log reader: renames columns, parses timestamps, drops stale
//! sentinel rows and groups events into case traces.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use ppm_common::{CaseId, Error, Result};
use ppm_config::ReadOptions;

use super::source;
use super::table::RawTable;
use super::trace::{is_sentinel_label, Event, EventLog, SYSTEM_USER};

pub const COL_CASE: &str = "caseid";
pub const COL_TASK: &str = "task";
pub const COL_USER: &str = "user";
pub const COL_START: &str = "start_timestamp";
pub const COL_END: &str = "end_timestamp";

/// Reads event logs under one set of [`ReadOptions`].
#[derive(Debug, Clone)]
pub struct LogReader<'a> {
    options: &'a ReadOptions,
    feature_columns: &'a [String],
}

impl<'a> LogReader<'a> {
    pub fn new(options: &'a ReadOptions) -> Self {
        Self {
            options,
            feature_columns: &[],
        }
    }

    /// Attribute columns that must survive column filtering (inter-case
    /// features).
    pub fn with_feature_columns(mut self, columns: &'a [String]) -> Self {
        self.feature_columns = columns;
        self
    }

    /// External-to-canonical column map for this read: the configured map
    /// plus the timestamp renames implied by the timestamp mode.
    pub fn column_map(&self) -> BTreeMap<String, String> {
        let mut map = self.options.column_names.clone();
        map.insert("Complete Timestamp".to_string(), COL_END.to_string());
        if !self.options.one_timestamp {
            map.insert("Start Timestamp".to_string(), COL_START.to_string());
        }
        map
    }

    /// The configured timestamp format in chrono syntax.
    pub fn chrono_format(&self) -> String {
        self.options.timeformat.replace(".%f", "%.f")
    }

    /// Read and ingest the log at `path` (`.csv`, `.csv.gz` or `.zip`).
    pub fn read_path(&self, path: &Path) -> Result<EventLog> {
        let data = source::load(path)?;
        self.read_csv(data.as_slice())
    }

    /// Ingest a CSV payload.
    pub fn read_csv<R: std::io::Read>(&self, reader: R) -> Result<EventLog> {
        self.read_table(RawTable::from_reader(reader)?)
    }

    /// Ingest an already-parsed table.
    pub fn read_table(&self, table: RawTable) -> Result<EventLog> {
        let map = self.column_map();
        let headers: Vec<String> = table
            .headers
            .iter()
            .map(|h| map.get(h).cloned().unwrap_or_else(|| h.clone()))
            .collect();
        let find = |name: &str| headers.iter().position(|h| h == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| Error::MissingColumn {
                column: name.to_string(),
            })
        };

        let case_col = require(COL_CASE)?;
        let task_col = require(COL_TASK)?;
        let end_col = require(COL_END)?;
        let start_col = if self.options.one_timestamp {
            None
        } else {
            Some(require(COL_START)?)
        };
        let user_col = find(COL_USER);
        let attr_cols = self.attribute_columns(&headers)?;

        let format = self.chrono_format();
        let mut events = Vec::with_capacity(table.len());
        let mut dropped = 0_usize;
        for (i, row) in table.rows.iter().enumerate() {
            let cell = |col: usize| row.get(col).unwrap_or("");
            let task = cell(task_col);
            if is_sentinel_label(task) {
                dropped += 1;
                continue;
            }
            // 1-based line number in the file, header included
            let line = i + 2;
            let user = user_col.map(cell).unwrap_or("");
            events.push(Event {
                case_id: CaseId::from(cell(case_col)),
                task: task.to_string(),
                user: if user.trim().is_empty() {
                    SYSTEM_USER.to_string()
                } else {
                    user.to_string()
                },
                start_timestamp: start_col
                    .map(|col| self.parse_timestamp(cell(col), &format, line))
                    .transpose()?,
                end_timestamp: self.parse_timestamp(cell(end_col), &format, line)?,
                attributes: attr_cols
                    .iter()
                    .map(|&(col, ref name)| (name.clone(), cell(col).to_string()))
                    .collect(),
            });
        }
        if dropped > 0 {
            tracing::debug!(
                target: crate::logging::event_names::INGEST_ROWS_DROPPED,
                rows = dropped as u64,
                "dropped pre-existing Start/End rows"
            );
        }

        let log = EventLog::from_events(events, self.options.one_timestamp);
        tracing::info!(
            target: crate::logging::event_names::INGEST_FINISHED,
            cases = log.len() as u64,
            events = log.event_count() as u64,
            "event log ingested"
        );
        Ok(log)
    }

    /// Columns carried into [`Event::attributes`], with their canonical
    /// names.
    fn attribute_columns(&self, headers: &[String]) -> Result<Vec<(usize, String)>> {
        let canonical: BTreeSet<&str> = [COL_CASE, COL_TASK, COL_USER, COL_START, COL_END]
            .into_iter()
            .collect();
        for feature in self.feature_columns {
            if !headers.contains(feature) {
                return Err(Error::MissingColumn {
                    column: feature.clone(),
                });
            }
        }
        Ok(headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !canonical.contains(h.as_str()))
            .filter(|(_, h)| {
                !self.options.filter_extraneous_columns || self.feature_columns.contains(h)
            })
            .map(|(i, h)| (i, h.clone()))
            .collect())
    }

    fn parse_timestamp(&self, value: &str, format: &str, row: usize) -> Result<NaiveDateTime> {
        let value = value.trim();
        NaiveDateTime::parse_from_str(value, format)
            .or_else(|e| {
                NaiveDate::parse_from_str(value, format)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .ok_or(e)
            })
            .map_err(|_| Error::InvalidTimestamp {
                value: value.to_string(),
                format: self.options.timeformat.clone(),
                row,
            })
    }
}
