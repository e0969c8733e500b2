//! # Ingestflow
//!
//! Sequential, stage-based pipelines in which every failure is data.
//!
//! Ingestflow runs an ordered list of stages against one input and provides:
//!
//! - **Schema contracts**: versioned, registered contracts checked on every
//!   stage input and output
//! - **Failures as data**: a failed stage yields a [`FailureRecord`](core::FailureRecord)
//!   with a cause, an impact and suggested fixes, and the run carries on
//! - **Hard dependencies**: stages whose failure aborts the rest of the run
//! - **AI boundary**: non-deterministic calls go through an adapter that
//!   validates the raw answer before it enters the pipeline
//! - **Audit trail**: an append-only, per-run stream of redacted log events
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ingestflow::prelude::*;
//!
//! let registry = SchemaRegistry::new()
//!     .with(SchemaContract::new("note", 1).field(FieldSpec::required("text", FieldType::String)))?;
//!
//! let pipeline = PipelineBuilder::new("ingest")
//!     .stage(StageSpec::new(Arc::new(FetchStage::new())).hard_dependency())
//!     .add(Arc::new(SummarizeStage::new()))
//!     .build(&registry)?;
//!
//! let runner = Runner::in_memory(Arc::new(registry));
//! let result = runner.start_run(input, &pipeline).await;
//! for record in result.failures() {
//!     println!("{record}");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod ai;
pub mod audit;
pub mod config;
pub mod core;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod runner;
pub mod schema;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ai::{
        ai_response_contract, AiBoundaryAdapter, AiCollaborator, AiRequest, AiStage,
        CollaboratorError, PromptTemplate,
    };
    pub use crate::audit::{
        AuditTrail, InMemoryAuditTrail, JsonlAuditTrail, LogEvent, LogEventType,
        LoggingAuditTrail, RunEvents,
    };
    pub use crate::config::{LoggingConfig, RunnerConfig};
    pub use crate::core::{
        FailureKind, FailureRecord, Payload, RunDiagnostics, RunResult, RunStatus, StageResult,
    };
    pub use crate::errors::{
        AuditError, IngestflowError, PipelineValidationError, SchemaRegistryError,
    };
    pub use crate::pipeline::{Pipeline, PipelineBuilder, StageSpec};
    pub use crate::runner::{CancellationToken, Runner};
    pub use crate::schema::{
        validate, FieldSpec, FieldType, SchemaContract, SchemaRegistry, ValidationOutcome,
    };
    pub use crate::stages::{
        AsyncFnStage, FnStage, RetryConfig, RetryingStage, Stage, StageContext,
    };
    pub use std::sync::Arc;
}
