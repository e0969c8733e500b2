//! Core domain model types for ingestflow.
//!
//! This module contains the data that flows through and out of a run:
//! - Run status and failure kind enums
//! - Failure records
//! - Stage results, run results and diagnostics
//! - The run lifecycle

mod failure;
mod result;
mod run;
mod status;

pub use failure::FailureRecord;
pub use result::{RunDiagnostics, RunResult, StageResult};
pub use run::{Run, RunTransitionError};
pub use status::{FailureKind, RunStatus};

/// Data passed between stages.
pub type Payload = serde_json::Value;
