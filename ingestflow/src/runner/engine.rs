//! The run state machine.
//!
//! A [`Runner`] executes the stages of a [`Pipeline`] strictly in order
//! against one input. Each stage's input and output are validated against
//! their declared contracts, every transition is appended to the audit
//! trail, and a stage failure becomes a [`FailureRecord`] in the
//! [`RunResult`] rather than an error. Only a hard-dependency failure,
//! cancellation, or a broken invariant (a panicking stage, a schema that
//! vanished from the registry) ends a run early.

use super::CancellationToken;
use crate::audit::{
    payload_digest, redact_failure, AuditTrail, InMemoryAuditTrail, LogEvent, LogEventType,
    RunEvents,
};
use crate::config::RunnerConfig;
use crate::core::{FailureRecord, Payload, Run, RunResult, RunStatus, StageResult};
use crate::errors::{AuditError, IngestflowError};
use crate::observability::SpanTimer;
use crate::pipeline::{Pipeline, StageSpec};
use crate::schema::SchemaRegistry;
use crate::stages::StageContext;
use chrono::Utc;
use futures::FutureExt;
use serde_json::json;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Producer name used when the initial input fails a stage's input contract.
pub const RUN_INPUT: &str = "run_input";

/// Executes pipelines.
///
/// A runner holds no per-run state, so one instance (or its clones) can
/// drive many runs concurrently. The schema registry and audit trail are
/// supplied by the caller.
#[derive(Clone)]
pub struct Runner {
    registry: Arc<SchemaRegistry>,
    audit: Arc<dyn AuditTrail>,
    config: RunnerConfig,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("schemas", &self.registry.len())
            .field("audit", &self.audit)
            .field("config", &self.config)
            .finish()
    }
}

impl Runner {
    /// Creates a runner with default configuration.
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>, audit: Arc<dyn AuditTrail>) -> Self {
        Self {
            registry,
            audit,
            config: RunnerConfig::default(),
        }
    }

    /// Creates a runner that records to an in-memory audit trail.
    #[must_use]
    pub fn in_memory(registry: Arc<SchemaRegistry>) -> Self {
        Self::new(registry, Arc::new(InMemoryAuditTrail::new()))
    }

    /// Creates a runner whose audit trail is built from `config`.
    pub fn from_config(registry: Arc<SchemaRegistry>, config: RunnerConfig) -> Result<Self, IngestflowError> {
        config.validate()?;
        let audit = config.audit_trail()?;
        Ok(Self {
            registry,
            audit,
            config,
        })
    }

    /// Replaces the configuration. The audit trail is kept.
    #[must_use]
    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// The schema registry.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// The audit trail.
    #[must_use]
    pub fn audit(&self) -> &Arc<dyn AuditTrail> {
        &self.audit
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs `pipeline` against `input`.
    pub async fn start_run(&self, input: Payload, pipeline: &Pipeline) -> RunResult {
        self.start_run_with_cancellation(input, pipeline, &CancellationToken::new())
            .await
    }

    /// Runs `pipeline` against `input`, checking `token` before every stage.
    pub async fn start_run_with_cancellation(
        &self,
        input: Payload,
        pipeline: &Pipeline,
        token: &CancellationToken,
    ) -> RunResult {
        let run = Run::new(pipeline.name(), pipeline.stage_names());
        let span = tracing::info_span!("run", run_id = %run.id(), pipeline = %pipeline.name());
        self.drive(run, input, pipeline, token).instrument(span).await
    }

    /// Events recorded for a run, in emission order.
    pub fn events_for(&self, run_id: Uuid) -> Result<RunEvents, AuditError> {
        self.audit.events_for(run_id)
    }

    async fn drive(
        &self,
        mut run: Run,
        input: Payload,
        pipeline: &Pipeline,
        token: &CancellationToken,
    ) -> RunResult {
        let run_id = run.id();
        let timer = SpanTimer::start();
        let mut recorder = Recorder::new(self.audit.as_ref(), run_id);

        let mut start_event = LogEvent::new(
            run_id,
            LogEventType::Start,
            format!("Run started for pipeline '{}'", pipeline.name()),
        )
        .with_metadata("pipeline", json!(pipeline.name()))
        .with_metadata("stages", json!(pipeline.stage_names()));
        if self.config.record_payload_digests {
            start_event = start_event.with_metadata("input_digest", json!(payload_digest(&input)));
        }
        let started_at = run.start().unwrap_or_else(|err| {
            tracing::error!(%err, "Run could not enter running state");
            Utc::now()
        });
        recorder.emit(start_event);
        tracing::info!(stages = pipeline.len(), "Run started");

        let mut current = input;
        let mut producer = RUN_INPUT.to_string();
        let mut stage_results = Vec::with_capacity(pipeline.len());
        let mut failures = Vec::new();
        let mut halt: Option<String> = None;
        let mut cancel_reason = None;

        for spec in pipeline.stages() {
            if token.is_cancelled() {
                let reason = token.reason().unwrap_or_else(|| "cancelled".to_string());
                tracing::info!(stage = %spec.name, %reason, "Run cancelled before stage");
                halt = Some(format!("cancelled before stage '{}': {reason}", spec.name));
                cancel_reason = Some(reason);
                break;
            }

            let stage_timer = SpanTimer::start();
            recorder.emit(
                LogEvent::new(run_id, LogEventType::Start, "Stage started")
                    .for_stage(&spec.name)
                    .with_metadata("input_schema", json!(spec.input_schema))
                    .with_metadata("output_schema", json!(spec.output_schema))
                    .with_metadata("hard_dependency", json!(spec.hard_dependency))
                    .with_metadata("input_from", json!(producer)),
            );

            let attempt = self.attempt(run_id, pipeline.name(), spec, &current, &producer).await;
            let duration_ms = stage_timer.elapsed_ms();

            match attempt {
                Attempt::Produced(payload) => {
                    let mut event = LogEvent::new(run_id, LogEventType::Success, "Stage completed")
                        .for_stage(&spec.name)
                        .with_metadata("schema_id", json!(spec.output_schema))
                        .with_metadata("duration_ms", json!(duration_ms));
                    if self.config.record_payload_digests {
                        event = event.with_metadata("output_digest", json!(payload_digest(&payload)));
                    }
                    recorder.emit(event);
                    tracing::debug!(stage = %spec.name, duration_ms, "Stage completed");

                    stage_results.push(StageResult::Success {
                        stage: spec.name.clone(),
                        payload: payload.clone(),
                        schema_id: spec.output_schema.clone(),
                        duration_ms,
                    });
                    current = payload;
                    producer.clone_from(&spec.name);
                }
                Attempt::Failed(record) => {
                    let impact = spec.impact_text();
                    let record = redact_failure(
                        match &spec.impact {
                            Some(declared) => record.with_impact(declared.clone()),
                            None => record,
                        }
                        .normalized(&spec.name, Some(&impact)),
                    );
                    tracing::warn!(
                        stage = %spec.name,
                        kind = %record.kind,
                        cause = %record.cause,
                        "Stage failed"
                    );
                    recorder.emit(
                        LogEvent::new(run_id, LogEventType::Failure, format!("Stage failed: {}", record.kind))
                            .for_stage(&spec.name)
                            .with_failure(&record)
                            .with_metadata("duration_ms", json!(duration_ms)),
                    );
                    stage_results.push(StageResult::Failure {
                        stage: spec.name.clone(),
                        record: record.clone(),
                        duration_ms,
                    });
                    failures.push(record);

                    if spec.hard_dependency {
                        halt = Some(format!("hard dependency '{}' failed", spec.name));
                        break;
                    }

                    recorder.emit(
                        LogEvent::new(
                            run_id,
                            LogEventType::Degraded,
                            format!("Continuing without output of '{}'", spec.name),
                        )
                        .for_stage(&spec.name)
                        .with_metadata("missing_capability", json!(impact))
                        .with_metadata("continuing_with", json!(producer)),
                    );
                }
                Attempt::Halted(record) => {
                    let record =
                        redact_failure(record.normalized(&spec.name, Some(&spec.impact_text())));
                    tracing::error!(
                        stage = %spec.name,
                        cause = %record.cause,
                        "Run invariant violated; aborting"
                    );
                    recorder.emit(
                        LogEvent::new(run_id, LogEventType::Failure, "Run invariant violated")
                            .for_stage(&spec.name)
                            .with_failure(&record)
                            .with_metadata("duration_ms", json!(duration_ms)),
                    );
                    stage_results.push(StageResult::Failure {
                        stage: spec.name.clone(),
                        record: record.clone(),
                        duration_ms,
                    });
                    failures.push(record);
                    halt = Some(format!("invariant violated in stage '{}'", spec.name));
                    break;
                }
            }
        }

        if halt.is_none() {
            if let Some(schema_id) = pipeline.final_contract() {
                if let Some(record) = self.check_final(schema_id, &current, &producer) {
                    tracing::warn!(
                        producer = %record.stage,
                        %schema_id,
                        cause = %record.cause,
                        "Final payload failed its contract"
                    );
                    recorder.emit(
                        LogEvent::new(run_id, LogEventType::Failure, "Final payload rejected")
                            .for_stage(&record.stage)
                            .with_failure(&record),
                    );
                    failures.push(record);
                }
            }
        }

        let status = match (&halt, failures.is_empty()) {
            (Some(_), _) => RunStatus::Aborted,
            (None, true) => RunStatus::Completed,
            (None, false) => RunStatus::CompletedWithFailures,
        };
        let ended_at = run.finish(status).unwrap_or_else(|err| {
            tracing::error!(%err, "Run could not reach terminal state");
            Utc::now()
        });

        let (event_type, message) = match status {
            RunStatus::Completed => (LogEventType::Success, "Run completed".to_string()),
            RunStatus::CompletedWithFailures => (
                LogEventType::Degraded,
                format!("Run completed with {} failed stage(s)", failures.len()),
            ),
            _ => (
                LogEventType::Failure,
                format!("Run aborted: {}", halt.as_deref().unwrap_or("unknown reason")),
            ),
        };
        let mut terminal = LogEvent::new(run_id, event_type, message)
            .with_metadata("status", json!(status))
            .with_metadata("attempted", json!(stage_results.len()))
            .with_metadata("failures", json!(failures.len()))
            .with_metadata("duration_ms", json!(timer.elapsed_ms()));
        if let Some(reason) = &cancel_reason {
            terminal = terminal.with_metadata("cancel_reason", json!(reason));
        }
        recorder.emit(terminal);

        tracing::info!(
            %status,
            attempted = stage_results.len(),
            failures = failures.len(),
            duration_ms = timer.elapsed_ms(),
            "Run finished"
        );

        let result = RunResult::new(
            run_id,
            pipeline.name(),
            status,
            stage_results,
            failures,
            started_at,
            ended_at,
            current,
        )
        .with_audit_warnings(recorder.into_warnings());
        match cancel_reason {
            Some(reason) => result.with_cancel_reason(reason),
            None => result,
        }
    }

    /// Validates the input, executes the stage and validates its output.
    async fn attempt(
        &self,
        run_id: Uuid,
        pipeline: &str,
        spec: &StageSpec,
        input: &Payload,
        producer: &str,
    ) -> Attempt {
        match self.registry.validate(&spec.input_schema, input) {
            Err(err) => {
                return Attempt::Halted(
                    FailureRecord::internal(&spec.name, format!("input contract unavailable: {err}"))
                        .with_fix("Register the schema before starting runs that use it")
                        .with_context("schema_id", json!(spec.input_schema)),
                );
            }
            Ok(outcome) => {
                if let Some(record) = outcome.into_failure(producer, &spec.input_schema) {
                    return Attempt::Failed(
                        record
                            .with_fix(format!(
                                "Check that '{producer}' produces a payload accepted by '{}'",
                                spec.name
                            ))
                            .with_impact(spec.impact_text())
                            .with_context("consumer", json!(spec.name)),
                    );
                }
            }
        }

        let ctx = StageContext::new(run_id, pipeline, &spec.name);
        let execution = AssertUnwindSafe(spec.runner.execute(&ctx, input)).catch_unwind();
        let limit = spec.timeout.or_else(|| self.config.stage_timeout());
        let caught = match limit {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(caught) => caught,
                Err(_) => {
                    let ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                    return Attempt::Failed(
                        FailureRecord::timeout(
                            &spec.name,
                            format!("stage '{}' did not finish within {ms} ms", spec.name),
                        )
                        .with_context("timeout_ms", json!(ms)),
                    );
                }
            },
            None => execution.await,
        };

        let payload = match caught {
            Ok(Ok(payload)) => payload,
            Ok(Err(record)) => return Attempt::Failed(attributed(record, spec)),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                return Attempt::Halted(
                    FailureRecord::internal(&spec.name, format!("stage panicked: {message}"))
                        .with_fix("Fix the stage so faults are returned as failure records")
                        .with_trace(message),
                );
            }
        };

        match self.registry.validate(&spec.output_schema, &payload) {
            Err(err) => Attempt::Halted(
                FailureRecord::internal(&spec.name, format!("output contract unavailable: {err}"))
                    .with_fix("Register the schema before starting runs that use it")
                    .with_context("schema_id", json!(spec.output_schema)),
            ),
            Ok(outcome) => match outcome.into_failure(&spec.name, &spec.output_schema) {
                Some(record) => Attempt::Failed(record),
                None => Attempt::Produced(payload),
            },
        }
    }

    /// Validates the final payload. A violation is attributed to the stage
    /// that produced the payload.
    fn check_final(&self, schema_id: &str, payload: &Payload, producer: &str) -> Option<FailureRecord> {
        match self.registry.validate(schema_id, payload) {
            Err(err) => {
                tracing::error!(%schema_id, %err, "Final contract unavailable; payload not checked");
                None
            }
            Ok(outcome) => outcome.into_failure(producer, schema_id).map(|record| {
                redact_failure(
                    record
                        .with_fix(format!(
                            "Check that '{producer}' produces a payload accepted by '{schema_id}'"
                        ))
                        .with_context("consumer", json!("final_contract")),
                )
            }),
        }
    }
}

/// Records returned by a stage body carry the stage's own name; report them
/// under the name the pipeline registered the stage as.
fn attributed(mut record: FailureRecord, spec: &StageSpec) -> FailureRecord {
    if record.stage == spec.runner.name() && record.stage != spec.name {
        record.stage.clone_from(&spec.name);
    }
    record
}

enum Attempt {
    Produced(Payload),
    Failed(FailureRecord),
    Halted(FailureRecord),
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Numbers events and absorbs audit failures.
struct Recorder<'a> {
    trail: &'a dyn AuditTrail,
    run_id: Uuid,
    next: u64,
    warnings: Vec<String>,
}

impl<'a> Recorder<'a> {
    fn new(trail: &'a dyn AuditTrail, run_id: Uuid) -> Self {
        Self {
            trail,
            run_id,
            next: 0,
            warnings: Vec::new(),
        }
    }

    fn emit(&mut self, event: LogEvent) {
        let sequence = self.next;
        self.next += 1;
        let event_type = event.event_type;
        if let Err(err) = self.trail.append(event.with_sequence(sequence)) {
            tracing::warn!(run_id = %self.run_id, sequence, %err, "Audit event not recorded");
            self.warnings
                .push(format!("event {sequence} ({event_type}) not recorded: {err}"));
        }
    }

    fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}
