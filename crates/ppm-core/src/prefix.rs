//! Per-event model features and prefix extraction.
//!
//! A case trace of `n` real events yields `n` prefixes. Each real event
//! becomes a [`Step`]: its activity and role indices, its normalized time
//! features and, for the inter vectorizer, its numeric inter-case features.

use chrono::TimeDelta;
use ppm_common::{CaseId, Error, Result};
use ppm_config::{ModelParameters, VectorizerKind, Vocabulary};
use serde::Serialize;

use crate::ingest::{CaseTrace, Event};
use crate::rescale::{TimeChannel, TimeScaler};

/// Model features of one real event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub activity: usize,
    pub role: usize,
    /// Normalized time channels: `[dur]` or `[dur, wait]`.
    pub times: Vec<f64>,
    /// Inter-case feature row; empty for the basic vectorizer.
    pub inter: Vec<f64>,
}

/// A prefix of real events and the event that follows it.
#[derive(Debug, Clone, Copy)]
pub struct Prefix<'a> {
    pub steps: &'a [Step],
    /// Absent for the full-length prefix.
    pub next: Option<&'a Step>,
}

impl Prefix<'_> {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Every prefix of `steps`, shortest first.
pub fn prefixes(steps: &[Step]) -> impl Iterator<Item = Prefix<'_>> {
    (1..=steps.len()).map(move |k| Prefix {
        steps: &steps[..k],
        next: steps.get(k),
    })
}

/// Everything needed to turn events into model features and back.
#[derive(Debug, Clone)]
pub struct FeatureSpec {
    pub activities: Vocabulary,
    pub roles: Vocabulary,
    pub scaler: TimeScaler,
    pub one_timestamp: bool,
    inter_features: Vec<String>,
}

impl FeatureSpec {
    pub fn from_params(params: &ModelParameters) -> Result<Self> {
        let inter_features = match params.vectorizer {
            VectorizerKind::Inter => params.inter_features.clone(),
            VectorizerKind::Basic => Vec::new(),
        };
        Ok(Self {
            activities: params.activities()?,
            roles: params.roles()?,
            scaler: TimeScaler::from_params(params)?,
            one_timestamp: params.one_timestamp,
            inter_features,
        })
    }

    pub fn channels(&self) -> &'static [TimeChannel] {
        TimeChannel::for_mode(self.one_timestamp)
    }

    pub fn inter_features(&self) -> &[String] {
        &self.inter_features
    }

    /// Encode every real event of `trace`. Errors name the case and the
    /// one-based position of the offending event.
    pub fn steps(&self, trace: &CaseTrace) -> Result<Vec<Step>> {
        let events = trace.events();
        let real = trace.real_len();
        (1..=real)
            .map(|i| {
                self.step(&events[i - 1], &events[i])
                    .map_err(|e| e.at_prefix(&trace.case_id, i))
            })
            .collect()
    }

    fn step(&self, prev: &Event, event: &Event) -> Result<Step> {
        let activity = lookup(&self.activities, "activity", &event.task, &event.case_id)?;
        let role = lookup(&self.roles, "role", &event.user, &event.case_id)?;

        let times = if self.one_timestamp {
            let dur = seconds(event.end_timestamp - prev.end_timestamp);
            vec![self.scaler.normalize(TimeChannel::Duration, dur)?]
        } else {
            let start = event.order_key();
            let dur = seconds(event.end_timestamp - start);
            let wait = seconds(start - prev.end_timestamp);
            vec![
                self.scaler.normalize(TimeChannel::Duration, dur)?,
                self.scaler.normalize(TimeChannel::Wait, wait)?,
            ]
        };

        let inter = self
            .inter_features
            .iter()
            .map(|name| feature_value(event, name))
            .collect::<Result<Vec<_>>>()?;

        Ok(Step {
            activity,
            role,
            times,
            inter,
        })
    }
}

fn lookup(vocab: &Vocabulary, kind: &str, label: &str, case_id: &CaseId) -> Result<usize> {
    vocab.index_of(label).ok_or_else(|| {
        Error::InvalidConfiguration(format!(
            "{kind} '{label}' of case {case_id} is not in the model vocabulary"
        ))
    })
}

fn feature_value(event: &Event, name: &str) -> Result<f64> {
    let raw = event
        .attributes
        .get(name)
        .map(|v| v.trim())
        .unwrap_or_default();
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse::<f64>().map_err(|_| {
        Error::Parse(format!(
            "case {}: inter-case feature '{name}' has non-numeric value '{raw}'",
            event.case_id
        ))
    })
}

/// Elapsed seconds, clamped at zero for overlapping events.
pub(crate) fn seconds(delta: TimeDelta) -> f64 {
    let secs = delta
        .num_microseconds()
        .map(|us| us as f64 / 1e6)
        .unwrap_or_else(|| delta.num_seconds() as f64);
    secs.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::EventLog;
    use chrono::NaiveDateTime;
    use std::collections::BTreeMap;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn event(case: &str, task: &str, start: Option<&str>, end: &str) -> Event {
        Event {
            case_id: CaseId::from(case),
            task: task.to_string(),
            user: "Clerk".to_string(),
            start_timestamp: start.map(at),
            end_timestamp: at(end),
            attributes: BTreeMap::new(),
        }
    }

    fn params(json: &str) -> ModelParameters {
        ModelParameters::from_str(json).unwrap()
    }

    fn identity_single() -> FeatureSpec {
        FeatureSpec::from_params(&params(
            r#"{"model_file": "m", "dim": {"time_dim": 3},
                "index_ac": {"Start": 0, "A": 1, "B": 2, "End": 3},
                "index_rl": {"Start": 0, "Clerk": 1, "End": 2}}"#,
        ))
        .unwrap()
    }

    #[test]
    fn single_mode_durations_are_end_to_end() {
        let log = EventLog::from_events(
            vec![
                event("C1", "A", None, "2021-01-01 00:00:10"),
                event("C1", "B", None, "2021-01-01 00:00:40"),
            ],
            true,
        );
        let trace = log.get(&CaseId::from("C1")).unwrap();
        let steps = identity_single().steps(trace).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].activity, 1);
        assert_eq!(steps[0].role, 1);
        assert_eq!(steps[0].times, vec![0.0]);
        assert_eq!(steps[1].times, vec![30.0]);
        assert!(steps[1].inter.is_empty());
    }

    #[test]
    fn dual_mode_splits_duration_and_wait() {
        let features = FeatureSpec::from_params(&params(
            r#"{"model_file": "m", "dim": {"time_dim": 3}, "one_timestamp": false,
                "index_ac": {"A": 0, "B": 1}, "index_rl": {"Clerk": 0}}"#,
        ))
        .unwrap();
        let log = EventLog::from_events(
            vec![
                event("C1", "A", Some("2021-01-01 00:00:00"), "2021-01-01 00:00:05"),
                event("C1", "B", Some("2021-01-01 00:00:20"), "2021-01-01 00:00:50"),
            ],
            false,
        );
        let steps = features.steps(log.get(&CaseId::from("C1")).unwrap()).unwrap();
        assert_eq!(steps[0].times, vec![5.0, 0.0]);
        assert_eq!(steps[1].times, vec![30.0, 15.0]);
    }

    #[test]
    fn unknown_activity_names_label_and_case() {
        let log = EventLog::from_events(vec![event("C9", "Z", None, "2021-01-01 00:00:00")], true);
        let err = identity_single()
            .steps(log.get(&CaseId::from("C9")).unwrap())
            .unwrap_err();
        assert_eq!(err.code(), 30);
        let text = err.to_string();
        assert!(text.contains("'Z'"), "{text}");
        assert!(text.contains("C9"), "{text}");
    }

    #[test]
    fn inter_features_parse_as_numbers() {
        let features = FeatureSpec::from_params(&params(
            r#"{"model_file": "m", "dim": {"time_dim": 3}, "vectorizer": "inter",
                "inter_features": ["open_cases", "load"],
                "index_ac": {"A": 0}, "index_rl": {"Clerk": 0}}"#,
        ))
        .unwrap();
        let mut e = event("C1", "A", None, "2021-01-01 00:00:00");
        e.attributes.insert("open_cases".into(), "4".into());
        e.attributes.insert("load".into(), " 0.25 ".into());
        let log = EventLog::from_events(vec![e.clone()], true);
        let steps = features.steps(log.get(&CaseId::from("C1")).unwrap()).unwrap();
        assert_eq!(steps[0].inter, vec![4.0, 0.25]);

        e.attributes.insert("load".into(), "high".into());
        let log = EventLog::from_events(vec![e], true);
        let err = features.steps(log.get(&CaseId::from("C1")).unwrap()).unwrap_err();
        assert_eq!(err.code(), 10);
    }

    #[test]
    fn prefixes_pair_with_next_step() {
        let steps: Vec<Step> = (0..3)
            .map(|i| Step {
                activity: i,
                role: 0,
                times: vec![0.0],
                inter: vec![],
            })
            .collect();
        let all: Vec<_> = prefixes(&steps).collect();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].len(), 1);
        assert_eq!(all[0].next.map(|s| s.activity), Some(1));
        assert_eq!(all[2].len(), 3);
        assert!(all[2].next.is_none());
    }

    #[test]
    fn overlapping_events_clamp_to_zero() {
        assert_eq!(seconds(TimeDelta::seconds(-5)), 0.0);
        assert_eq!(seconds(TimeDelta::milliseconds(1500)), 1.5);
    }
}
