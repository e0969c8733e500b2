//! End-to-end runner tests.

use super::*;
use crate::ai::{ai_response_contract, AiBoundaryAdapter, AiStage, PromptTemplate};
use crate::audit::{AuditTrail, InMemoryAuditTrail, JsonlAuditTrail, LogEventType};
use crate::config::RunnerConfig;
use crate::core::{FailureKind, FailureRecord, RunStatus};
use crate::pipeline::{Pipeline, PipelineBuilder, StageSpec};
use crate::schema::{FieldSpec, FieldType, SchemaContract, SchemaRegistry};
use crate::stages::{FnStage, JitterStrategy, RetryConfig, RetryingStage, Stage};
use crate::testing::{
    FailingAuditTrail, FailingStage, PanickingStage, RecordingStage, ScriptedCollaborator,
    SlowStage, StaticStage,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .register(
            SchemaContract::new("request", 1)
                .field(FieldSpec::required("url", FieldType::String).matching("^https?://")),
        )
        .unwrap();
    registry
        .register(
            SchemaContract::new("capture", 1)
                .field(FieldSpec::required("text", FieldType::String).non_empty())
                .field(FieldSpec::optional("source", FieldType::String)),
        )
        .unwrap();
    registry
        .register(
            SchemaContract::new("analysis", 1)
                .field(FieldSpec::required("text", FieldType::String))
                .field(FieldSpec::required("confidence", FieldType::Number).in_range(Some(0.0), Some(1.0)))
                .field(FieldSpec::required("category", FieldType::String).one_of([json!("note"), json!("task")])),
        )
        .unwrap();
    registry.register(ai_response_contract()).unwrap();
    registry
}

fn capture() -> Value {
    json!({"text": "meeting notes", "source": "https://example.org/notes"})
}

fn request() -> Value {
    json!({"url": "https://example.org/notes"})
}

fn fetch() -> Arc<dyn Stage> {
    Arc::new(StaticStage::new("fetch", "request.v1", "capture.v1", capture()))
}

fn runner(registry: SchemaRegistry) -> (Runner, Arc<InMemoryAuditTrail>) {
    let trail = Arc::new(InMemoryAuditTrail::new());
    (Runner::new(Arc::new(registry), trail.clone()), trail)
}

fn build(registry: &SchemaRegistry, builder: PipelineBuilder) -> Pipeline {
    builder.build(registry).unwrap()
}

#[tokio::test]
async fn test_all_stages_succeed() {
    let registry = registry();
    let write = Arc::new(RecordingStage::new("write", "capture.v1"));
    let pipeline = build(
        &registry,
        PipelineBuilder::new("ingest").add(fetch()).add(write.clone()),
    );
    let (runner, _) = runner(registry);

    let result = runner.start_run(request(), &pipeline).await;

    assert_eq!(result.status(), RunStatus::Completed);
    assert!(result.failures().is_empty());
    assert_eq!(result.stage_results().len(), 2);
    assert_eq!(result.final_payload(), &capture());
    assert_eq!(write.inputs(), vec![capture()]);

    let events = runner.events_for(result.run_id()).unwrap();
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (0..events.len() as u64).collect::<Vec<_>>());
    assert_eq!(events.iter().next().unwrap().event_type, LogEventType::Start);
    let last = events.last().unwrap();
    assert!(last.is_run_level());
    assert_eq!(last.event_type, LogEventType::Success);
    assert_eq!(events.of_type(LogEventType::Success).len(), 3);
    assert!(events.for_stage("fetch")[1].metadata.contains_key("output_digest"));
}

#[tokio::test]
async fn test_bound_violation_is_skipped_and_run_continues() {
    let registry = registry();
    let analyze = Arc::new(StaticStage::new(
        "analyze",
        "capture.v1",
        "analysis.v1",
        json!({"text": "meeting notes", "confidence": 1.7, "category": "note"}),
    ));
    let write = Arc::new(RecordingStage::new("write", "capture.v1"));
    let pipeline = build(
        &registry,
        PipelineBuilder::new("ingest")
            .add(fetch())
            .add(analyze)
            .add(write.clone()),
    );
    let (runner, _) = runner(registry);

    let result = runner.start_run(request(), &pipeline).await;

    assert_eq!(result.status(), RunStatus::CompletedWithFailures);
    assert_eq!(result.failures().len(), 1);
    let record = &result.failures()[0];
    assert_eq!(record.kind, FailureKind::ValidationError);
    assert_eq!(record.stage, "analyze");
    assert!(record.cause.contains("confidence"));
    assert!(!record.suggested_fixes.is_empty());

    assert_eq!(result.stage_results().len(), 3);
    assert!(result.result_for("write").unwrap().is_success());
    assert_eq!(write.inputs(), vec![capture()]);

    let events = runner.events_for(result.run_id()).unwrap();
    let degraded = events.for_stage("analyze");
    let degraded = degraded
        .iter()
        .find(|e| e.event_type == LogEventType::Degraded)
        .unwrap();
    assert_eq!(degraded.metadata["continuing_with"], json!("fetch"));
    assert_eq!(events.last().unwrap().event_type, LogEventType::Degraded);
}

#[tokio::test]
async fn test_hard_dependency_timeout_aborts() {
    let registry = registry();
    let slow_fetch = Arc::new(SlowStage::with_delay_ms("fetch", "request.v1", 500));
    let analyze = Arc::new(StaticStage::new("analyze", "capture.v1", "analysis.v1", json!({})));
    let write = Arc::new(RecordingStage::new("write", "capture.v1"));
    let pipeline = build(
        &registry,
        PipelineBuilder::new("ingest")
            .stage(
                StageSpec::new(slow_fetch)
                    .hard_dependency()
                    .with_timeout(Duration::from_millis(20)),
            )
            .add(analyze.clone())
            .add(write.clone()),
    );
    let (runner, _) = runner(registry);

    let result = runner.start_run(request(), &pipeline).await;

    assert_eq!(result.status(), RunStatus::Aborted);
    assert_eq!(result.failures().len(), 1);
    assert_eq!(result.failures()[0].kind, FailureKind::Timeout);
    assert_eq!(result.failures()[0].stage, "fetch");
    assert_eq!(result.stage_results().len(), 1);
    assert!(result.result_for("analyze").is_none());
    assert!(result.result_for("write").is_none());
    assert_eq!(analyze.call_count(), 0);
    assert_eq!(write.call_count(), 0);

    let events = runner.events_for(result.run_id()).unwrap();
    let last = events.last().unwrap();
    assert!(last.is_run_level());
    assert_eq!(last.event_type, LogEventType::Failure);
    assert!(events.of_type(LogEventType::Degraded).is_empty());
}

#[tokio::test]
async fn test_ai_response_without_explanation_fails_at_adapter() {
    let registry = registry();
    let collaborator = Arc::new(
        ScriptedCollaborator::new().respond(r#"{"content": "a summary", "confidence": 0.9}"#),
    );
    let adapter = AiBoundaryAdapter::new(
        "summarize",
        collaborator.clone(),
        Arc::new(ai_response_contract()),
        PromptTemplate::new("summarize", 1, "Summarize: {text}"),
    )
    .with_config(&RunnerConfig::default());
    let write = Arc::new(RecordingStage::new("write", "capture.v1"));
    let pipeline = build(
        &registry,
        PipelineBuilder::new("ingest")
            .add(fetch())
            .add(Arc::new(AiStage::new("summarize", "capture.v1", adapter)))
            .add(write.clone()),
    );
    let (runner, _) = runner(registry);

    let result = runner.start_run(request(), &pipeline).await;

    assert_eq!(result.status(), RunStatus::CompletedWithFailures);
    let record = &result.failures()[0];
    assert_eq!(record.stage, "summarize");
    assert_eq!(record.kind, FailureKind::ValidationError);
    assert!(record.cause.contains("explanation"));
    assert_eq!(record.context["prompt_id"], json!("summarize"));
    assert_eq!(record.context["fields"], json!(["explanation"]));

    assert_eq!(collaborator.requests()[0].prompt, "Summarize: meeting notes");
    assert_eq!(write.inputs(), vec![capture()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_runs_keep_separate_event_streams() {
    let registry = registry();
    let record = Arc::new(RecordingStage::new("record", "capture.v1"));
    let pipeline = build(
        &registry,
        PipelineBuilder::new("ingest")
            .add(Arc::new(SlowStage::with_delay_ms("pause", "capture.v1", 20)))
            .add(record.clone()),
    );
    let (runner, trail) = runner(registry);

    let first = tokio::spawn({
        let (runner, pipeline) = (runner.clone(), pipeline.clone());
        async move { runner.start_run(json!({"text": "first"}), &pipeline).await }
    });
    let second = tokio::spawn({
        let (runner, pipeline) = (runner.clone(), pipeline.clone());
        async move { runner.start_run(json!({"text": "second"}), &pipeline).await }
    });
    let (first, second) = (first.await.unwrap(), second.await.unwrap());

    assert_ne!(first.run_id(), second.run_id());
    assert_eq!(trail.run_ids().len(), 2);
    for result in [&first, &second] {
        let events = runner.events_for(result.run_id()).unwrap();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.run_id == result.run_id()));
        let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, (0..events.len() as u64).collect::<Vec<_>>());
    }
    assert_eq!(first.final_payload(), &json!({"text": "first"}));
    assert_eq!(second.final_payload(), &json!({"text": "second"}));
    assert_eq!(record.call_count(), 2);
}

#[tokio::test]
async fn test_stages_after_hard_failure_are_not_attempted() {
    let registry = registry();
    let enrich = Arc::new(FailingStage::internal("enrich", "capture.v1", "index offline"));
    let write = Arc::new(RecordingStage::new("write", "capture.v1"));
    let pipeline = build(
        &registry,
        PipelineBuilder::new("ingest")
            .add(fetch())
            .stage(StageSpec::new(enrich.clone()).hard_dependency())
            .add(write.clone()),
    );
    let (runner, _) = runner(registry);

    let result = runner.start_run(request(), &pipeline).await;

    assert_eq!(result.status(), RunStatus::Aborted);
    assert_eq!(result.stage_results().len(), 2);
    assert_eq!(enrich.call_count(), 1);
    assert_eq!(write.call_count(), 0);
    assert_eq!(result.final_payload(), &capture());
    assert!(result.failures().iter().all(FailureRecord::is_well_formed));
}

#[tokio::test]
async fn test_invalid_run_input_is_attributed_to_run_input() {
    let registry = registry();
    let pipeline = build(&registry, PipelineBuilder::new("ingest").add(fetch()));
    let (runner, _) = runner(registry);

    let result = runner.start_run(json!({"url": "ftp://example.org"}), &pipeline).await;

    assert_eq!(result.status(), RunStatus::CompletedWithFailures);
    let stage_result = result.result_for("fetch").unwrap();
    let record = stage_result.failure().unwrap();
    assert_eq!(record.stage, RUN_INPUT);
    assert_eq!(record.kind, FailureKind::ValidationError);
    assert_eq!(record.context["consumer"], json!("fetch"));
    assert!(record.impact.contains("fetch"));
}

#[tokio::test]
async fn test_stage_impact_is_reported() {
    let registry = registry();
    let enrich = Arc::new(FailingStage::new(
        "enrich",
        "capture.v1",
        FailureRecord::external_call("enrich", "tag service returned 503"),
    ));
    let pipeline = build(
        &registry,
        PipelineBuilder::new("ingest")
            .add(fetch())
            .stage(StageSpec::new(enrich).with_impact("notes are stored without tags")),
    );
    let (runner, _) = runner(registry);

    let result = runner.start_run(request(), &pipeline).await;

    assert_eq!(result.failures()[0].impact, "notes are stored without tags");
    let events = runner.events_for(result.run_id()).unwrap();
    let degraded = events.of_type(LogEventType::Degraded);
    assert_eq!(degraded[0].metadata["missing_capability"], json!("notes are stored without tags"));

    let diagnostics = result.diagnostics();
    assert_eq!(diagnostics.errors, vec!["enrich: tag service returned 503".to_string()]);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let registry = registry();
    let write = Arc::new(RecordingStage::new("write", "capture.v1"));
    let pipeline = build(&registry, PipelineBuilder::new("ingest").add(write.clone()));
    let (runner, _) = runner(registry);
    let token = CancellationToken::new();
    token.cancel("shutting down");

    let result = runner
        .start_run_with_cancellation(capture(), &pipeline, &token)
        .await;

    assert_eq!(result.status(), RunStatus::Aborted);
    assert!(result.stage_results().is_empty());
    assert_eq!(result.cancel_reason(), Some("shutting down"));
    assert_eq!(write.call_count(), 0);

    let events = runner.events_for(result.run_id()).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events.last().unwrap().metadata["cancel_reason"], json!("shutting down"));
}

#[tokio::test]
async fn test_cancelled_between_stages() {
    let registry = registry();
    let token = CancellationToken::new();
    let handle = token.clone();
    let cancel = FnStage::new("cancel", "capture.v1", "capture.v1", move |_, input| {
        handle.cancel("operator request");
        Ok(input.clone())
    });
    let write = Arc::new(RecordingStage::new("write", "capture.v1"));
    let pipeline = build(
        &registry,
        PipelineBuilder::new("ingest")
            .add(Arc::new(cancel))
            .add(write.clone()),
    );
    let (runner, _) = runner(registry);

    let result = runner
        .start_run_with_cancellation(capture(), &pipeline, &token)
        .await;

    assert_eq!(result.status(), RunStatus::Aborted);
    assert_eq!(result.stage_results().len(), 1);
    assert!(result.stage_results()[0].is_success());
    assert_eq!(write.call_count(), 0);
}

#[tokio::test]
async fn test_panicking_stage_aborts_run() {
    let registry = registry();
    let write = Arc::new(RecordingStage::new("write", "capture.v1"));
    let pipeline = build(
        &registry,
        PipelineBuilder::new("ingest")
            .add(Arc::new(PanickingStage::new("broken", "capture.v1", "index out of bounds")))
            .add(write.clone()),
    );
    let (runner, _) = runner(registry);

    let result = runner.start_run(capture(), &pipeline).await;

    assert_eq!(result.status(), RunStatus::Aborted);
    assert_eq!(result.stage_results().len(), 1);
    let record = &result.failures()[0];
    assert_eq!(record.kind, FailureKind::InternalError);
    assert!(record.cause.contains("index out of bounds"));
    assert_eq!(record.trace.as_deref(), Some("index out of bounds"));
    assert_eq!(write.call_count(), 0);
}

#[tokio::test]
async fn test_schema_missing_at_run_time_aborts() {
    let pipeline = build(
        &registry(),
        PipelineBuilder::new("ingest").add(Arc::new(RecordingStage::new("write", "capture.v1"))),
    );
    let (runner, _) = runner(SchemaRegistry::new());

    let result = runner.start_run(capture(), &pipeline).await;

    assert_eq!(result.status(), RunStatus::Aborted);
    assert_eq!(result.failures()[0].kind, FailureKind::InternalError);
    assert!(result.failures()[0].cause.contains("capture.v1"));
}

#[tokio::test]
async fn test_default_stage_timeout_from_config() {
    let registry = registry();
    let pipeline = build(
        &registry,
        PipelineBuilder::new("ingest")
            .add(Arc::new(SlowStage::with_delay_ms("pause", "capture.v1", 500))),
    );
    let (runner, _) = runner(registry);
    let runner = runner.with_config(RunnerConfig::new().with_stage_timeout(Duration::from_millis(20)));

    let result = runner.start_run(capture(), &pipeline).await;

    assert_eq!(result.status(), RunStatus::CompletedWithFailures);
    assert_eq!(result.failures()[0].kind, FailureKind::Timeout);
    assert_eq!(result.failures()[0].context["timeout_ms"], json!(20));
}

#[tokio::test]
async fn test_audit_outage_is_reported_not_fatal() {
    let registry = registry();
    let pipeline = build(&registry, PipelineBuilder::new("ingest").add(fetch()));
    let trail = Arc::new(FailingAuditTrail::new());
    let runner = Runner::new(Arc::new(registry), trail.clone());

    let result = runner.start_run(request(), &pipeline).await;

    assert_eq!(result.status(), RunStatus::Completed);
    assert_eq!(result.audit_warnings().len(), trail.attempts());
    assert!(result.audit_warnings()[0].contains("audit sink offline"));
}

#[tokio::test]
async fn test_failure_record_survives_jsonl_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry();
    let pipeline = build(
        &registry,
        PipelineBuilder::new("ingest").add(fetch()).add(Arc::new(FailingStage::new(
            "enrich",
            "capture.v1",
            FailureRecord::external_call("enrich", "tag service returned 503")
                .with_fix("Check the tag service status page")
                .with_context("status", json!(503)),
        ))),
    );
    let trail = Arc::new(JsonlAuditTrail::open(dir.path().join("audit.jsonl")).unwrap());
    let runner = Runner::new(Arc::new(registry), trail.clone());

    let result = runner.start_run(request(), &pipeline).await;

    let reread = JsonlAuditTrail::open(trail.path()).unwrap();
    let events = reread.events_for(result.run_id()).unwrap();
    let logged = events
        .of_type(LogEventType::Failure)
        .iter()
        .find_map(|e| e.failure_record())
        .unwrap();
    assert_eq!(&logged, &result.failures()[0]);
}

#[tokio::test]
async fn test_runner_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunnerConfig::new()
        .with_audit_log_path(dir.path().join("runs").join("audit.jsonl"))
        .with_payload_digests(false);
    let registry = registry();
    let pipeline = build(&registry, PipelineBuilder::new("ingest").add(fetch()));
    let runner = Runner::from_config(Arc::new(registry), config).unwrap();

    let result = runner.start_run(request(), &pipeline).await;

    let events = runner.events_for(result.run_id()).unwrap();
    assert_eq!(result.status(), RunStatus::Completed);
    assert!(events.iter().all(|e| !e.metadata.contains_key("output_digest")));
    assert!(dir.path().join("runs").join("audit.jsonl").exists());
}

#[tokio::test]
async fn test_retry_is_declared_by_the_stage() {
    let registry = registry();
    let flaky = FailingStage::new(
        "enrich",
        "capture.v1",
        FailureRecord::external_call("enrich", "tag service returned 503"),
    );
    let retrying = RetryingStage::new(
        flaky,
        RetryConfig::new()
            .with_max_attempts(3)
            .with_base_delay_ms(1)
            .with_jitter(JitterStrategy::None),
    );
    let pipeline = build(
        &registry,
        PipelineBuilder::new("ingest").add(fetch()).add(Arc::new(retrying)),
    );
    let (runner, _) = runner(registry);

    let result = runner.start_run(request(), &pipeline).await;

    assert_eq!(result.status(), RunStatus::CompletedWithFailures);
    assert_eq!(result.stage_results().len(), 2);
    assert_eq!(result.failures()[0].context["attempts"], json!(3));
}

#[tokio::test]
async fn test_renamed_stage_failure_uses_pipeline_name() {
    let registry = registry();
    let enrich = Arc::new(FailingStage::internal("enrich", "capture.v1", "index offline"));
    let pipeline = build(
        &registry,
        PipelineBuilder::new("ingest")
            .add(fetch())
            .stage(StageSpec::new(enrich).with_name("tagger")),
    );
    let (runner, _) = runner(registry);

    let result = runner.start_run(request(), &pipeline).await;

    assert_eq!(result.failures()[0].stage, "tagger");
    assert_eq!(result.result_for("tagger").unwrap().failure().unwrap().stage, "tagger");
    assert!(result.result_for("enrich").is_none());
    assert_eq!(result.diagnostics().errors, vec!["tagger: index offline".to_string()]);

    let events = runner.events_for(result.run_id()).unwrap();
    let logged = events.for_stage("tagger")[1].failure_record().unwrap();
    assert_eq!(logged.stage, "tagger");
}

#[tokio::test]
async fn test_failure_with_sensitive_text_matches_audit_trail() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry();
    let pipeline = build(
        &registry,
        PipelineBuilder::new("ingest").add(fetch()).add(Arc::new(FailingStage::internal(
            "clone",
            "capture.v1",
            "clone of git@github.com:org/repo.git failed",
        ))),
    );
    let trail = Arc::new(JsonlAuditTrail::open(dir.path().join("audit.jsonl")).unwrap());
    let runner = Runner::new(Arc::new(registry), trail.clone());

    let result = runner.start_run(request(), &pipeline).await;

    let record = &result.failures()[0];
    assert_eq!(record.cause, "clone of [REDACTED]:org/repo.git failed");
    let logged = trail
        .events_for(result.run_id())
        .unwrap()
        .of_type(LogEventType::Failure)
        .iter()
        .find_map(|e| e.failure_record())
        .unwrap();
    assert_eq!(&logged, record);
}

#[tokio::test]
async fn test_final_payload_checked_against_final_contract() {
    let registry = registry();
    let rejected = build(
        &registry,
        PipelineBuilder::new("ingest").add(fetch()).final_contract("analysis.v1"),
    );
    let accepted = build(
        &registry,
        PipelineBuilder::new("ingest").add(fetch()).final_contract("capture.v1"),
    );
    let (runner, _) = runner(registry);

    let result = runner.start_run(request(), &rejected).await;

    assert_eq!(result.status(), RunStatus::CompletedWithFailures);
    assert_eq!(result.stage_results().len(), 1);
    assert!(result.result_for("fetch").unwrap().failure().is_none());
    let record = &result.failures()[0];
    assert_eq!(record.stage, "fetch");
    assert_eq!(record.kind, FailureKind::ValidationError);
    assert_eq!(record.context["consumer"], json!("final_contract"));
    assert_eq!(result.final_payload(), &capture());

    let events = runner.events_for(result.run_id()).unwrap();
    assert_eq!(events.last().unwrap().metadata["failures"], json!(1));

    let result = runner.start_run(request(), &accepted).await;
    assert_eq!(result.status(), RunStatus::Completed);
}
