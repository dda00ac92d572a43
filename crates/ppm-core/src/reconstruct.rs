//! Absolute timestamps from per-record time deltas.
//!
//! Records are processed in order; a change of `caseid` from one record to
//! the next starts a new case, which restarts both tracks at that case's
//! anchor. The expected and predicted tracks never read each other.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, TimeDelta};
use ppm_common::{CaseId, Error, Result};
use ppm_config::AnchorMode;

use crate::record::ResultRecord;

#[derive(Debug, Clone, Copy)]
struct Tracks {
    expected: NaiveDateTime,
    predicted: NaiveDateTime,
}

/// Fill `end_timestamp_expected` and `end_timestamp_pred` on every record.
pub fn reconstruct(
    records: &mut [ResultRecord],
    anchors: &BTreeMap<CaseId, NaiveDateTime>,
    mode: AnchorMode,
) -> Result<()> {
    for case in records.chunk_by_mut(|a, b| a.caseid == b.caseid) {
        let case_id = &case[0].caseid;
        let anchor = anchors
            .get(case_id)
            .copied()
            .ok_or_else(|| Error::MissingAnchor {
                case_id: case_id.clone(),
            })?;
        reconstruct_case(case, anchor, mode)?;
    }
    Ok(())
}

/// Fill both timestamps on the records of a single case, in prefix order.
pub fn reconstruct_case(case: &mut [ResultRecord], anchor: NaiveDateTime, mode: AnchorMode) -> Result<()> {
    let start = Tracks {
        expected: anchor,
        predicted: anchor,
    };
    case.iter_mut()
        .enumerate()
        .try_fold(start, |prev, (i, record)| {
            let next = if i == 0 && mode == AnchorMode::AnchorFirst {
                prev
            } else {
                Tracks {
                    expected: advance(prev.expected, record.timing.expected_delta(), record)?,
                    predicted: advance(prev.predicted, record.timing.predicted_delta(), record)?,
                }
            };
            record.end_timestamp_expected = Some(next.expected);
            record.end_timestamp_pred = Some(next.predicted);
            Ok::<_, Error>(next)
        })
        .map(|_| ())
}

fn advance(from: NaiveDateTime, seconds: f64, record: &ResultRecord) -> Result<NaiveDateTime> {
    let delta = if seconds.is_finite() {
        Some(TimeDelta::microseconds((seconds * 1e6).round() as i64))
    } else {
        None
    };
    delta
        .and_then(|d| from.checked_add_signed(d))
        .ok_or_else(|| {
            Error::NonFinite {
                field: "end_timestamp".to_string(),
            }
            .at_prefix(&record.caseid, record.pref_size)
        })
}
