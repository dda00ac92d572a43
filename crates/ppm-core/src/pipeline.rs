//! Batch prediction over an event log.
//!
//! For every selected case the engine walks its prefixes in order, encodes
//! each one, calls the predictor, decodes and rescales the output, then
//! reconstructs the case's absolute timestamps from its anchor. Any of these
//! failing is a failure of that case alone. Cases are independent and run in
//! chunks of `max_parallel` scoped threads; records come back in case order
//! either way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ppm_common::error::BatchSummary;
use ppm_common::{BatchError, BatchResult, CaseId, Error, Result, RunId, SCHEMA_VERSION};
use ppm_config::validate::{validate_params, validate_run};
use ppm_config::{
    AnchorMode, CaseFilter, ConfigSnapshot, DecodeVariant, FailurePolicy, ModelParameters,
    PrefixSource, RunConfig, RunMode, VectorizerKind,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::decode::{Decoded, Decoder, Strategy};
use crate::encode::FeatureWindow;
use crate::filter::select_cases;
use crate::ingest::{CaseTrace, EventLog};
use crate::logging::{event_names, LogContext, Stage};
use crate::predictor::{ModelOutput, PredictionRequest, Predictor};
use crate::prefix::{FeatureSpec, Step};
use crate::reconstruct::reconstruct_case;
use crate::record::ResultRecord;

/// Cooperative cancellation, checked before every case and every prefix.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Validated, immutable settings of one batch run.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    features: FeatureSpec,
    decoder: Decoder,
    variant: DecodeVariant,
    time_dim: usize,
    vectorizer: VectorizerKind,
    prefix_source: PrefixSource,
    anchor_mode: AnchorMode,
    failure_policy: FailurePolicy,
    case_filter: CaseFilter,
    max_parallel: usize,
    seed: Option<u64>,
}

impl BatchPlan {
    pub fn new(params: &ModelParameters, run: &RunConfig) -> Result<Self> {
        if run.mode == RunMode::Next {
            return Err(Error::InvalidConfiguration(
                "mode 'next' (single-event prediction) is not served by the batch engine"
                    .to_string(),
            ));
        }
        validate_params(params)?;
        validate_run(run, params)?;

        Ok(Self {
            features: FeatureSpec::from_params(params)?,
            decoder: Decoder::new(Strategy::from_run(run)),
            variant: run.variant,
            time_dim: params.time_dim(),
            vectorizer: params.vectorizer,
            prefix_source: run.prefix_source,
            anchor_mode: run.anchor_mode,
            failure_policy: run.on_case_error,
            case_filter: run.case_filter.clone(),
            max_parallel: run.max_parallel.max(1),
            seed: run.seed,
        })
    }

    pub fn features(&self) -> &FeatureSpec {
        &self.features
    }

    pub fn strategy(&self) -> Strategy {
        self.decoder.strategy()
    }
}

/// Provenance and counts of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunSummary {
    pub schema_version: String,
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub variant: DecodeVariant,
    pub prediction_count: usize,
    pub prefix_source: PrefixSource,
    pub anchor_mode: AnchorMode,
    /// Per-case outcome counts.
    pub cases: BatchSummary,
    pub records: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<BatchError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSnapshot>,
}

/// Records of a run, in case order then prefix order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchOutput {
    pub summary: RunSummary,
    pub records: Vec<ResultRecord>,
}

pub struct BatchEngine<P> {
    plan: BatchPlan,
    predictor: P,
    cancel: CancelToken,
    ctx: LogContext,
    snapshot: Option<ConfigSnapshot>,
}

impl<P: Predictor> BatchEngine<P> {
    pub fn new(plan: BatchPlan, predictor: P) -> Self {
        Self {
            plan,
            predictor,
            cancel: CancelToken::new(),
            ctx: LogContext::new(RunId::new()),
            snapshot: None,
        }
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.ctx = LogContext::new(run_id);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Embed the configuration snapshot in the run summary.
    pub fn with_snapshot(mut self, snapshot: ConfigSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn run_id(&self) -> &RunId {
        &self.ctx.run_id
    }

    pub fn run(&self, log: &EventLog) -> Result<BatchOutput> {
        let started_at = Utc::now();
        let _span = self.ctx.span(Stage::Predict).entered();
        if log.one_timestamp != self.plan.features.one_timestamp {
            return Err(Error::InvalidConfiguration(format!(
                "event log was read with one_timestamp={} but the model expects one_timestamp={}",
                log.one_timestamp, self.plan.features.one_timestamp
            )));
        }
        let cases = select_cases(log, &self.plan.case_filter)?;

        crate::log_event!(
            self.ctx,
            INFO,
            event_names::BATCH_STARTED,
            Stage::Init,
            "batch run started",
            cases = cases.len(),
            variant = self.plan.variant.as_str(),
            predictor = self.predictor.name(),
            max_parallel = self.plan.max_parallel
        );

        let mut outcome: BatchResult<Vec<ResultRecord>> = BatchResult::default();
        let positioned: Vec<(usize, &CaseTrace)> = cases.into_iter().enumerate().collect();
        for chunk in positioned.chunks(self.plan.max_parallel) {
            for (&(_, trace), result) in chunk.iter().zip(self.run_chunk(chunk)) {
                let case_id = trace.case_id.as_str();
                match result {
                    Ok(records) => {
                        crate::log_event!(
                            self.ctx,
                            DEBUG,
                            event_names::BATCH_CASE_DONE,
                            Stage::Predict,
                            "case finished",
                            case_id = case_id,
                            records = records.len()
                        );
                        outcome.add_success(records);
                    }
                    Err(err) if self.should_skip(&err) => {
                        let reason = err.to_string();
                        crate::log_event!(
                            self.ctx,
                            WARN,
                            event_names::BATCH_CASE_SKIPPED,
                            Stage::Predict,
                            "case skipped",
                            case_id = case_id,
                            code = err.code(),
                            reason = reason.as_str()
                        );
                        outcome.add_failure(case_id, &err);
                    }
                    Err(err) => {
                        if matches!(err.root(), Error::Cancelled) {
                            crate::log_event!(
                                self.ctx,
                                WARN,
                                event_names::BATCH_CANCELLED,
                                Stage::Predict,
                                "batch run cancelled",
                                completed = outcome.summary.succeeded
                            );
                        }
                        return Err(err);
                    }
                }
            }
        }

        let records: Vec<ResultRecord> = std::mem::take(&mut outcome.succeeded)
            .into_iter()
            .flatten()
            .collect();

        let summary = RunSummary {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: self.ctx.run_id.clone(),
            started_at,
            finished_at: Utc::now(),
            variant: self.plan.variant,
            prediction_count: self.plan.strategy().count(),
            prefix_source: self.plan.prefix_source,
            anchor_mode: self.plan.anchor_mode,
            cases: outcome.summary,
            records: records.len(),
            failures: outcome.failed,
            config: self.snapshot.clone(),
        };
        crate::log_event!(
            self.ctx,
            INFO,
            event_names::BATCH_FINISHED,
            Stage::Predict,
            "batch run finished",
            succeeded = summary.cases.succeeded,
            failed = summary.cases.failed,
            records = summary.records
        );
        Ok(BatchOutput { summary, records })
    }

    fn should_skip(&self, err: &Error) -> bool {
        self.plan.failure_policy == FailurePolicy::SkipCase
            && !matches!(err.root(), Error::Cancelled)
    }

    fn run_chunk(&self, chunk: &[(usize, &CaseTrace)]) -> Vec<Result<Vec<ResultRecord>>> {
        if let [(position, trace)] = chunk {
            return vec![self.run_case(*position, trace)];
        }
        std::thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|&(position, trace)| scope.spawn(move || self.run_case(position, trace)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(Error::Predictor("case worker panicked".to_string())))
                })
                .collect()
        })
    }

    fn case_rng(&self, position: usize) -> StdRng {
        match self.plan.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(position as u64)),
            None => StdRng::from_os_rng(),
        }
    }

    fn run_case(&self, position: usize, trace: &CaseTrace) -> Result<Vec<ResultRecord>> {
        self.cancel.check()?;
        let steps = self.plan.features.steps(trace)?;
        let n = steps.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        let first = match self.plan.prefix_source {
            PrefixSource::Log => 1,
            PrefixSource::Prediction { start_prefix } => start_prefix.clamp(1, n),
        };
        let feed_back = matches!(self.plan.prefix_source, PrefixSource::Prediction { .. });

        let mut rng = self.case_rng(position);
        let mut prefix: Vec<Step> = steps[..first - 1].to_vec();
        let mut carried: Option<Step> = None;
        let mut records = Vec::with_capacity(n + 1 - first);
        for k in first..=n {
            self.cancel.check()?;
            prefix.push(carried.take().unwrap_or_else(|| steps[k - 1].clone()));
            let (record, predicted) = self
                .predict_prefix(&trace.case_id, &prefix, steps.get(k), &mut rng)
                .map_err(|e| e.at_prefix(&trace.case_id, k))?;
            if feed_back {
                carried = Some(predicted);
            }
            records.push(record);
        }

        let _span = self.ctx.span(Stage::Reconstruct).entered();
        reconstruct_case(&mut records, trace.anchor(), self.plan.anchor_mode)?;
        Ok(records)
    }

    fn predict_prefix(
        &self,
        case_id: &CaseId,
        prefix: &[Step],
        next: Option<&Step>,
        rng: &mut StdRng,
    ) -> Result<(ResultRecord, Step)> {
        let features = &self.plan.features;
        let channels = features.channels().len();
        let window = FeatureWindow::encode(prefix, self.plan.time_dim, self.plan.vectorizer);
        let output = self.predictor.predict(&PredictionRequest {
            case_id,
            prefix_len: prefix.len(),
            window: &window,
        })?;
        output.check_shape(features.activities.width(), features.roles.width(), channels)?;

        let decoded = self.plan.decoder.decode(&output, rng)?;
        let record = features.record(
            case_id,
            prefix,
            next,
            &decoded,
            &output,
            self.plan.strategy().is_multi(),
        )?;
        Ok((record, predicted_step(&decoded, &output, prefix, channels)))
    }
}

/// The step a prediction-fed prefix is extended with: the top-ranked
/// activity and role, the raw time output, and the last known inter row.
fn predicted_step(decoded: &Decoded, output: &ModelOutput, prefix: &[Step], channels: usize) -> Step {
    Step {
        activity: decoded.activity.top().map_or(0, |p| p.index),
        role: decoded.role.top().map_or(0, |p| p.index),
        times: output.times[..channels].to_vec(),
        inter: prefix.last().map(|s| s.inter.clone()).unwrap_or_default(),
    }
}
