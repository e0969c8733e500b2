//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ingestflow::prelude::*;
use ingestflow::testing::{FailingStage, RecordingStage, StaticStage};
use serde_json::json;

fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with(
            SchemaContract::new("request", 1)
                .field(FieldSpec::required("url", FieldType::String).matching("^https?://")),
        )
        .and_then(|r| {
            r.with(
                SchemaContract::new("capture", 1)
                    .field(FieldSpec::required("text", FieldType::String).non_empty())
                    .field(FieldSpec::optional("tags", FieldType::Array).items(FieldType::String)),
            )
        })
        .unwrap()
}

fn pipeline(registry: &SchemaRegistry, failing_middle: bool) -> Pipeline {
    let capture = json!({"text": "meeting notes", "tags": ["work", "weekly"]});
    let middle: Arc<dyn Stage> = if failing_middle {
        Arc::new(FailingStage::internal("enrich", "capture.v1", "index offline"))
    } else {
        Arc::new(RecordingStage::new("enrich", "capture.v1"))
    };
    PipelineBuilder::new("bench")
        .add(Arc::new(StaticStage::new("fetch", "request.v1", "capture.v1", capture)))
        .add(middle)
        .add(Arc::new(RecordingStage::new("write", "capture.v1")))
        .build(registry)
        .unwrap()
}

fn pipeline_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let registry = registry();
    let runner = Runner::in_memory(Arc::new(registry.clone()));
    let clean = pipeline(&registry, false);
    let degraded = pipeline(&registry, true);
    let input = json!({"url": "https://example.org/notes"});

    c.bench_function("three_stage_clean_run", |b| {
        b.iter(|| rt.block_on(runner.start_run(black_box(input.clone()), &clean)));
    });

    c.bench_function("three_stage_degraded_run", |b| {
        b.iter(|| rt.block_on(runner.start_run(black_box(input.clone()), &degraded)));
    });

    let payload = json!({"text": "meeting notes", "tags": ["work", "weekly"]});
    let contract = registry.require("capture.v1").unwrap();
    c.bench_function("validate_payload", |b| {
        b.iter(|| validate(black_box(&payload), &contract));
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
