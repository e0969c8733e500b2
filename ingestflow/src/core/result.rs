//! Stage and run results.

use super::{FailureRecord, Payload, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Outcome of one attempted stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageResult {
    /// The stage produced a payload that satisfied its output contract.
    Success {
        /// Stage name.
        stage: String,
        /// Validated output payload.
        payload: Payload,
        /// Output contract the payload was validated against.
        schema_id: String,
        /// Wall-clock time spent in the stage.
        duration_ms: u64,
    },
    /// The stage failed.
    Failure {
        /// Stage name.
        stage: String,
        /// What went wrong.
        record: FailureRecord,
        /// Wall-clock time spent in the stage.
        duration_ms: u64,
    },
}

impl StageResult {
    /// Returns the stage name.
    #[must_use]
    pub fn stage(&self) -> &str {
        match self {
            Self::Success { stage, .. } | Self::Failure { stage, .. } => stage,
        }
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns true if the stage failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Returns the payload of a successful stage.
    #[must_use]
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            Self::Failure { .. } => None,
        }
    }

    /// Returns the failure record of a failed stage.
    #[must_use]
    pub fn failure(&self) -> Option<&FailureRecord> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { record, .. } => Some(record),
        }
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        match self {
            Self::Success { duration_ms, .. } | Self::Failure { duration_ms, .. } => *duration_ms,
        }
    }
}

/// Complete outcome of a run, returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    run_id: Uuid,
    pipeline: String,
    status: RunStatus,
    stage_results: Vec<StageResult>,
    failures: Vec<FailureRecord>,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    final_payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cancel_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    audit_warnings: Vec<String>,
}

impl RunResult {
    /// Assembles a run result.
    ///
    /// `failures` holds every record produced during the run, including
    /// aborting ones that have no matching stage result.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: Uuid,
        pipeline: impl Into<String>,
        status: RunStatus,
        stage_results: Vec<StageResult>,
        failures: Vec<FailureRecord>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        final_payload: Payload,
    ) -> Self {
        Self {
            run_id,
            pipeline: pipeline.into(),
            status,
            stage_results,
            failures,
            started_at,
            ended_at,
            final_payload,
            cancel_reason: None,
            audit_warnings: Vec::new(),
        }
    }

    /// Sets the cancellation reason.
    #[must_use]
    pub fn with_cancel_reason(mut self, reason: impl Into<String>) -> Self {
        self.cancel_reason = Some(reason.into());
        self
    }

    /// Sets the audit warnings collected during the run.
    #[must_use]
    pub fn with_audit_warnings(mut self, warnings: Vec<String>) -> Self {
        self.audit_warnings = warnings;
        self
    }

    /// Run identifier.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Name of the pipeline that was run.
    #[must_use]
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Terminal status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Results of the stages that were attempted, in order.
    #[must_use]
    pub fn stage_results(&self) -> &[StageResult] {
        &self.stage_results
    }

    /// Every failure recorded during the run.
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// When the run started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the run ended.
    #[must_use]
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    /// Total run duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    /// The last known-good payload.
    ///
    /// This is the output of the last successful stage, or the run input if
    /// no stage succeeded.
    #[must_use]
    pub fn final_payload(&self) -> &Payload {
        &self.final_payload
    }

    /// Why the run was cancelled, if it was.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    /// Audit trail writes that failed during the run.
    #[must_use]
    pub fn audit_warnings(&self) -> &[String] {
        &self.audit_warnings
    }

    /// Returns the result for a named stage.
    #[must_use]
    pub fn result_for(&self, stage: &str) -> Option<&StageResult> {
        self.stage_results.iter().find(|r| r.stage() == stage)
    }

    /// Returns true if the run finished with no failures.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.status == RunStatus::Completed && self.failures.is_empty()
    }

    /// Summarises the run for display.
    #[must_use]
    pub fn diagnostics(&self) -> RunDiagnostics {
        let stage_status = self
            .stage_results
            .iter()
            .map(|r| {
                let status = if r.is_success() { "success" } else { "failure" };
                (r.stage().to_string(), status.to_string())
            })
            .collect();

        let errors = self
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.stage, f.cause))
            .collect();

        let mut seen = HashSet::new();
        let suggested_fixes = self
            .failures
            .iter()
            .flat_map(|f| f.suggested_fixes.iter())
            .filter(|fix| seen.insert(fix.as_str()))
            .cloned()
            .collect();

        RunDiagnostics {
            run_id: self.run_id,
            status: self.status,
            stage_status,
            errors,
            suggested_fixes,
        }
    }

    /// Serializes the result to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Human-oriented summary of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// Run identifier.
    pub run_id: Uuid,
    /// Terminal status.
    pub status: RunStatus,
    /// `(stage, "success" | "failure")` for every attempted stage.
    pub stage_status: Vec<(String, String)>,
    /// One `stage: cause` line per failure.
    pub errors: Vec<String>,
    /// Suggested fixes across all failures, first occurrence wins.
    pub suggested_fixes: Vec<String>,
}
