//! Run status and failure kind enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created but not started.
    #[default]
    Pending,
    /// Stages are being executed.
    Running,
    /// Every attempted stage succeeded.
    Completed,
    /// The run reached its end with at least one recoverable failure.
    CompletedWithFailures,
    /// A hard dependency failed, the run was cancelled, or an invariant broke.
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::CompletedWithFailures => write!(f, "completed_with_failures"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl RunStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CompletedWithFailures | Self::Aborted
        )
    }

    /// Returns true if the run reached the end of its stage list.
    #[must_use]
    pub fn reached_end(&self) -> bool {
        matches!(self, Self::Completed | Self::CompletedWithFailures)
    }
}

/// Category of a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A payload or AI response violated its schema contract.
    ValidationError,
    /// An external collaborator was unreachable or returned something unusable.
    ExternalCallError,
    /// A programming or environment fault inside a stage.
    InternalError,
    /// An external call or stage exceeded its time bound.
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationError => write!(f, "validation_error"),
            Self::ExternalCallError => write!(f, "external_call_error"),
            Self::InternalError => write!(f, "internal_error"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl FailureKind {
    /// Returns true if repeating the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ExternalCallError | Self::Timeout)
    }

    /// The fix suggested when a failure of this kind carries none.
    #[must_use]
    pub fn default_fix(&self) -> &'static str {
        match self {
            Self::ValidationError => {
                "Inspect the reported fields and align the producer with its schema contract"
            }
            Self::ExternalCallError => "Check collaborator availability, then retry the run",
            Self::InternalError => "Review the stage logs and report the fault with its trace",
            Self::Timeout => "Retry the run or raise the configured timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_display() {
        assert_eq!(RunStatus::Pending.to_string(), "pending");
        assert_eq!(
            RunStatus::CompletedWithFailures.to_string(),
            "completed_with_failures"
        );
        assert_eq!(RunStatus::Aborted.to_string(), "aborted");
    }

    #[test]
    fn test_run_status_is_terminal() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::CompletedWithFailures.is_terminal());
        assert!(RunStatus::Aborted.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::Aborted.reached_end());
    }

    #[test]
    fn test_failure_kind_serialize() {
        let json = serde_json::to_string(&FailureKind::ExternalCallError).unwrap();
        assert_eq!(json, r#""external_call_error""#);

        let kind: FailureKind = serde_json::from_str(r#""timeout""#).unwrap();
        assert_eq!(kind, FailureKind::Timeout);
    }

    #[test]
    fn test_failure_kind_transient() {
        assert!(FailureKind::Timeout.is_transient());
        assert!(FailureKind::ExternalCallError.is_transient());
        assert!(!FailureKind::ValidationError.is_transient());
        assert!(!FailureKind::InternalError.is_transient());
    }
}
