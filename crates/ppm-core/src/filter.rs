//! Case selection for a batch run.

use ppm_common::{Error, Result};
use ppm_config::CaseFilter;

use crate::ingest::{CaseTrace, EventLog};

/// Cases of `log` that pass `filter`, in case order.
///
/// Fails with [`Error::EmptyRange`] when nothing is selected. Without an
/// event-count range the reported bounds span every case in the log.
pub fn select_cases<'a>(log: &'a EventLog, filter: &CaseFilter) -> Result<Vec<&'a CaseTrace>> {
    let selected: Vec<&CaseTrace> = log
        .traces()
        .filter(|t| {
            filter
                .event_count_range
                .is_none_or(|range| range.contains(t.real_len()))
        })
        .filter(|t| {
            filter
                .case_ids
                .as_ref()
                .is_none_or(|ids| ids.iter().any(|id| id == t.case_id.as_str()))
        })
        .collect();

    if selected.is_empty() {
        let (min, max) = match filter.event_count_range {
            Some(range) => (range.min, range.max),
            None => (0, log.traces().map(CaseTrace::real_len).max().unwrap_or(0)),
        };
        return Err(Error::EmptyRange {
            min,
            max,
            considered: log.len(),
        });
    }
    tracing::debug!(
        selected = selected.len(),
        considered = log.len(),
        "case filter applied"
    );
    Ok(selected)
}
