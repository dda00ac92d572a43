//! Raw tabular view of an event log.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord};
use ppm_common::{Error, Result};

/// Header plus string rows, exactly as read from the CSV payload.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<StringRecord>,
}

impl RawTable {
    /// Parse a CSV payload with a header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        let headers = csv
            .headers()
            .map_err(|e| Error::Parse(format!("csv header: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect();
        let rows = csv
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Parse(format!("csv: {}", e)))?;
        Ok(Self { headers, rows })
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
