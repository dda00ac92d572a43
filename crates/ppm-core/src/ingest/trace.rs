//! Ingested events and sentinel-bounded case traces.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use ppm_common::CaseId;
use serde::Serialize;

/// Task and user label of the synthetic first event of every trace.
pub const START: &str = "Start";
/// Task and user label of the synthetic last event of every trace.
pub const END: &str = "End";
/// User assigned to events that name none.
pub const SYSTEM_USER: &str = "SYS";

/// One row of the event log after renaming and parsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub case_id: CaseId,
    pub task: String,
    pub user: String,
    /// Present only for dual-timestamp logs.
    pub start_timestamp: Option<NaiveDateTime>,
    pub end_timestamp: NaiveDateTime,
    /// Non-canonical columns kept by the reader.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Event {
    /// Sort key within a case: the start timestamp when there is one.
    pub fn order_key(&self) -> NaiveDateTime {
        self.start_timestamp.unwrap_or(self.end_timestamp)
    }

    pub fn is_sentinel(&self) -> bool {
        is_sentinel_label(&self.task)
    }

    fn sentinel(case_id: &CaseId, label: &str, at: NaiveDateTime, dual: bool) -> Self {
        Event {
            case_id: case_id.clone(),
            task: label.to_string(),
            user: label.to_string(),
            start_timestamp: dual.then_some(at),
            end_timestamp: at,
            attributes: BTreeMap::new(),
        }
    }
}

pub(crate) fn is_sentinel_label(task: &str) -> bool {
    task == START || task == END
}

/// Lifecycle transition of a raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Start,
    Complete,
}

/// One lifecycle transition: an event split at its start or completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub case_id: CaseId,
    pub task: String,
    pub user: String,
    pub event_type: EventType,
    pub timestamp: NaiveDateTime,
}

/// All events of one case, bounded by `Start` and `End` sentinels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseTrace {
    pub case_id: CaseId,
    events: Vec<Event>,
}

impl CaseTrace {
    /// Order `real` events by their order key (stable, so ties keep row
    /// order) and wrap them in sentinels. Returns `None` for an empty case.
    pub fn new(case_id: CaseId, mut real: Vec<Event>) -> Option<Self> {
        real.sort_by_key(Event::order_key);
        let first = real.first()?;
        let last = real.last()?;
        let dual = first.start_timestamp.is_some();
        let start = Event::sentinel(&case_id, START, first.order_key(), dual);
        let end = Event::sentinel(&case_id, END, last.end_timestamp, dual);

        let mut events = Vec::with_capacity(real.len() + 2);
        events.push(start);
        events.extend(real);
        events.push(end);
        Some(Self { case_id, events })
    }

    /// Every event, sentinels included.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events between the sentinels.
    pub fn real_events(&self) -> &[Event] {
        &self.events[1..self.events.len() - 1]
    }

    /// Number of events between the sentinels.
    pub fn real_len(&self) -> usize {
        self.events.len() - 2
    }

    /// Earliest real completion time; reconstruction starts here.
    pub fn anchor(&self) -> NaiveDateTime {
        self.real_events()
            .iter()
            .map(|e| e.end_timestamp)
            .min()
            .unwrap_or(self.events[0].end_timestamp)
    }

    /// Start/complete transitions ordered by timestamp (stable). Single
    /// timestamp events yield one `complete` transition each.
    pub fn transitions(&self) -> Vec<Transition> {
        let mut out = Vec::with_capacity(self.events.len() * 2);
        for event in &self.events {
            let split = |event_type, timestamp| Transition {
                case_id: event.case_id.clone(),
                task: event.task.clone(),
                user: event.user.clone(),
                event_type,
                timestamp,
            };
            if let Some(start) = event.start_timestamp {
                out.push(split(EventType::Start, start));
            }
            out.push(split(EventType::Complete, event.end_timestamp));
        }
        out.sort_by_key(|t| t.timestamp);
        out
    }
}

/// An ingested event log: one trace per case, keyed by case id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventLog {
    traces: BTreeMap<CaseId, CaseTrace>,
    pub one_timestamp: bool,
}

impl EventLog {
    /// Group events by case, preserving row order within each case.
    pub fn from_events(events: Vec<Event>, one_timestamp: bool) -> Self {
        let mut grouped: BTreeMap<CaseId, Vec<Event>> = BTreeMap::new();
        for event in events {
            grouped.entry(event.case_id.clone()).or_default().push(event);
        }
        let traces = grouped
            .into_iter()
            .filter_map(|(id, events)| CaseTrace::new(id.clone(), events).map(|t| (id, t)))
            .collect();
        Self {
            traces,
            one_timestamp,
        }
    }

    /// Traces in case-id order.
    pub fn traces(&self) -> impl Iterator<Item = &CaseTrace> {
        self.traces.values()
    }

    pub fn get(&self, case_id: &CaseId) -> Option<&CaseTrace> {
        self.traces.get(case_id)
    }

    /// Number of cases.
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Number of real events across all cases.
    pub fn event_count(&self) -> usize {
        self.traces.values().map(CaseTrace::real_len).sum()
    }

    /// Reconstruction anchor of every case.
    pub fn anchors(&self) -> BTreeMap<CaseId, NaiveDateTime> {
        self.traces
            .iter()
            .map(|(id, trace)| (id.clone(), trace.anchor()))
            .collect()
    }

    /// The transition view of every case.
    pub fn raw_traces(&self) -> BTreeMap<CaseId, Vec<Transition>> {
        self.traces
            .iter()
            .map(|(id, trace)| (id.clone(), trace.transitions()))
            .collect()
    }
}
