//! Run identity and lifecycle.

use super::RunStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error raised on an illegal run status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Illegal run transition: {from} -> {to}")]
pub struct RunTransitionError {
    /// Status before the transition.
    pub from: RunStatus,
    /// Requested status.
    pub to: RunStatus,
}

/// One execution of a pipeline against one input.
///
/// Status only moves forward: `pending -> running -> terminal`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    id: Uuid,
    pipeline: String,
    stages: Vec<String>,
    status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ended_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Creates a pending run with a fresh time-ordered id.
    #[must_use]
    pub fn new(pipeline: impl Into<String>, stages: Vec<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            pipeline: pipeline.into(),
            stages,
            status: RunStatus::Pending,
            started_at: None,
            ended_at: None,
        }
    }

    /// Run identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Pipeline name.
    #[must_use]
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Ordered stage names.
    #[must_use]
    pub fn stages(&self) -> &[String] {
        &self.stages
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// When the run started.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// When the run ended.
    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Moves the run from `pending` to `running`.
    pub fn start(&mut self) -> Result<DateTime<Utc>, RunTransitionError> {
        if self.status != RunStatus::Pending {
            return Err(RunTransitionError {
                from: self.status,
                to: RunStatus::Running,
            });
        }
        let now = Utc::now();
        self.status = RunStatus::Running;
        self.started_at = Some(now);
        Ok(now)
    }

    /// Moves the run from `running` to a terminal status.
    pub fn finish(&mut self, status: RunStatus) -> Result<DateTime<Utc>, RunTransitionError> {
        if self.status != RunStatus::Running || !status.is_terminal() {
            return Err(RunTransitionError {
                from: self.status,
                to: status,
            });
        }
        let now = Utc::now();
        self.status = status;
        self.ended_at = Some(now);
        Ok(now)
    }
}
