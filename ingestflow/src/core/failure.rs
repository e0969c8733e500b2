//! Structured failure records.

use super::FailureKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Structured description of what went wrong in a stage.
///
/// A `FailureRecord` is a value, not an exception: stages return it, the
/// runner stores it in the [`RunResult`](super::RunResult), and the audit
/// trail persists it. Any crash trace is kept in [`trace`](Self::trace) as
/// auxiliary metadata, never as the primary description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stage the failure is attributed to.
    pub stage: String,
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable cause.
    pub cause: String,
    /// What downstream data is now missing or degraded.
    pub impact: String,
    /// Ordered remediation steps. Always serialized, possibly empty.
    #[serde(default)]
    pub suggested_fixes: Vec<String>,
    /// Auxiliary diagnostic trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    /// When the failure was recorded.
    pub occurred_at: DateTime<Utc>,
    /// Additional structured context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl FailureRecord {
    /// Creates a new failure record with no suggested fixes.
    #[must_use]
    pub fn new(stage: impl Into<String>, kind: FailureKind, cause: impl Into<String>) -> Self {
        let stage = stage.into();
        let impact = default_impact(&stage);
        Self {
            stage,
            kind,
            cause: cause.into(),
            impact,
            suggested_fixes: Vec::new(),
            trace: None,
            occurred_at: Utc::now(),
            context: BTreeMap::new(),
        }
    }

    /// Creates a `validation_error` record with the default fix.
    #[must_use]
    pub fn validation(stage: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::ValidationError, cause).with_default_fix()
    }

    /// Creates an `external_call_error` record with the default fix.
    #[must_use]
    pub fn external_call(stage: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::ExternalCallError, cause).with_default_fix()
    }

    /// Creates an `internal_error` record with the default fix.
    #[must_use]
    pub fn internal(stage: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::InternalError, cause).with_default_fix()
    }

    /// Creates a `timeout` record with the default fix.
    #[must_use]
    pub fn timeout(stage: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::Timeout, cause).with_default_fix()
    }

    /// Sets the impact description.
    #[must_use]
    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.impact = impact.into();
        self
    }

    /// Appends a suggested fix.
    #[must_use]
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fixes.push(fix.into());
        self
    }

    /// Replaces the suggested fixes.
    #[must_use]
    pub fn with_fixes(mut self, fixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggested_fixes = fixes.into_iter().map(Into::into).collect();
        self
    }

    /// Attaches an auxiliary trace.
    #[must_use]
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    fn with_default_fix(mut self) -> Self {
        self.suggested_fixes.push(self.kind.default_fix().to_string());
        self
    }

    /// Returns true if stage and cause are populated.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.stage.trim().is_empty() && !self.cause.trim().is_empty()
    }

    /// Fills in whatever a stage left blank.
    ///
    /// Records entering a run result must name a stage, a cause, an impact
    /// and at least one fix.
    #[must_use]
    pub fn normalized(mut self, stage: &str, impact: Option<&str>) -> Self {
        if self.stage.trim().is_empty() {
            self.stage = stage.to_string();
        }
        if self.cause.trim().is_empty() {
            self.cause = "stage reported a failure without a cause".to_string();
        }
        if self.impact.trim().is_empty() {
            self.impact = impact.map_or_else(|| default_impact(&self.stage), ToString::to_string);
        }
        if self.suggested_fixes.is_empty() {
            self.suggested_fixes.push(self.kind.default_fix().to_string());
        }
        self
    }

    /// Converts the record to a JSON value.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({
                "stage": self.stage,
                "kind": self.kind,
                "cause": self.cause,
            })
        })
    }
}

fn default_impact(stage: &str) -> String {
    format!("output of stage '{stage}' is unavailable to downstream stages")
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.stage, self.cause)
    }
}

impl std::error::Error for FailureRecord {}
