//! Audit log events.

use crate::core::{FailureRecord, Payload};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;

/// Replacement for redacted values.
pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "authorization",
    "cookie",
    "email",
    "phone",
    "ssn",
];

#[allow(clippy::expect_used)]
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("valid regex")
});

/// Kind of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEventType {
    /// A run or stage started.
    Start,
    /// A run or stage succeeded.
    Success,
    /// A run or stage failed.
    Failure,
    /// The run continues without a capability, or ended with failures.
    Degraded,
}

impl fmt::Display for LogEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Degraded => write!(f, "degraded"),
        }
    }
}

/// One append-only entry of the audit trail.
///
/// Run-level events have no stage. Metadata passes through a redaction
/// filter on insertion: values under sensitive keys and e-mail addresses in
/// strings are replaced with [`REDACTED`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Run the event belongs to.
    pub run_id: Uuid,
    /// Position within the run, starting at 0.
    pub sequence: u64,
    /// Stage name, `None` for run-level events.
    #[serde(default)]
    pub stage: Option<String>,
    /// Event type.
    pub event_type: LogEventType,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Human-readable message.
    pub message: String,
    /// Structured metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl LogEvent {
    /// Creates a run-level event.
    #[must_use]
    pub fn new(run_id: Uuid, event_type: LogEventType, message: impl Into<String>) -> Self {
        Self {
            run_id,
            sequence: 0,
            stage: None,
            event_type,
            timestamp: Utc::now(),
            message: message.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attributes the event to a stage.
    #[must_use]
    pub fn for_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Sets the sequence number.
    #[must_use]
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Adds a redacted metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        let key = key.into();
        let value = if is_sensitive_key(&key) {
            serde_json::Value::String(REDACTED.to_string())
        } else {
            redact(value)
        };
        self.metadata.insert(key, value);
        self
    }

    /// Attaches a failure record under the `failure` key.
    #[must_use]
    pub fn with_failure(self, record: &FailureRecord) -> Self {
        self.with_metadata("failure", record.to_value())
    }

    /// Returns true for run-level events.
    #[must_use]
    pub fn is_run_level(&self) -> bool {
        self.stage.is_none()
    }

    /// Parses the failure record stored under `failure`, if any.
    #[must_use]
    pub fn failure_record(&self) -> Option<FailureRecord> {
        self.metadata
            .get("failure")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|s| {
        key == *s || key.ends_with(&format!("_{s}")) || key.starts_with(&format!("{s}_"))
    })
}

/// Recursively redacts sensitive keys and e-mail addresses.
#[must_use]
pub fn redact(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::String(s) => {
            if EMAIL.is_match(&s) {
                Value::String(EMAIL.replace_all(&s, REDACTED).into_owned())
            } else {
                Value::String(s)
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(redact).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(k, v)| {
                    if is_sensitive_key(&k) {
                        (k, Value::String(REDACTED.to_string()))
                    } else {
                        (k, redact(v))
                    }
                })
                .collect(),
        ),
        other => other,
    }
}

/// Redacts the text and context of a failure record.
///
/// Applying it twice gives the same record, so a redacted record stored in
/// a run result reads back unchanged from the audit trail.
#[must_use]
pub fn redact_failure(record: FailureRecord) -> FailureRecord {
    serde_json::from_value(redact(record.to_value())).unwrap_or(record)
}

/// SHA-256 hex digest of a payload's compact JSON form.
#[must_use]
pub fn payload_digest(payload: &Payload) -> String {
    hex::encode(Sha256::digest(payload.to_string().as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_event_builder() {
        let run_id = Uuid::now_v7();
        let event = LogEvent::new(run_id, LogEventType::Start, "Stage started")
            .for_stage("fetch")
            .with_sequence(3)
            .with_metadata("attempt", json!(1));

        assert_eq!(event.run_id, run_id);
        assert_eq!(event.sequence, 3);
        assert_eq!(event.stage.as_deref(), Some("fetch"));
        assert!(!event.is_run_level());
        assert_eq!(event.metadata["attempt"], json!(1));
    }

    #[test]
    fn test_sensitive_keys_redacted() {
        let event = LogEvent::new(Uuid::now_v7(), LogEventType::Start, "started")
            .with_metadata("api_key", json!("sk-123"))
            .with_metadata(
                "request",
                json!({"access_token": "abc", "prompt_tokens": 12, "nested": [{"password": "p"}]}),
            );

        assert_eq!(event.metadata["api_key"], json!(REDACTED));
        assert_eq!(
            event.metadata["request"],
            json!({"access_token": REDACTED, "prompt_tokens": 12, "nested": [{"password": REDACTED}]})
        );
    }

    #[test]
    fn test_email_redacted_in_strings() {
        let value = redact(json!({"note": "ping jane.doe@example.com today"}));
        assert_eq!(value, json!({"note": "ping [REDACTED] today"}));
    }

    #[test]
    fn test_failure_round_trip_through_metadata() {
        let record = FailureRecord::timeout("analyze", "no answer in 30000ms").with_impact("no summary");
        let event = LogEvent::new(Uuid::now_v7(), LogEventType::Failure, "Stage failed")
            .for_stage("analyze")
            .with_failure(&record);

        assert_eq!(event.failure_record(), Some(record));
    }

    #[test]
    fn test_redacted_failure_reads_back_unchanged() {
        let record = redact_failure(
            FailureRecord::internal("clone", "clone of git@github.com:org/repo.git failed")
                .with_context("api_key", json!("sk-123")),
        );
        assert_eq!(record.cause, "clone of [REDACTED]:org/repo.git failed");
        assert_eq!(record.context["api_key"], json!(REDACTED));
        assert_eq!(redact_failure(record.clone()), record);

        let event = LogEvent::new(Uuid::now_v7(), LogEventType::Failure, "Stage failed")
            .with_failure(&record);
        assert_eq!(event.failure_record(), Some(record));
    }

    #[test]
    fn test_payload_digest_is_stable() {
        let a = payload_digest(&json!({"b": 1, "a": [1, 2]}));
        let b = payload_digest(&json!({"a": [1, 2], "b": 1}));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(LogEventType::Degraded.to_string(), "degraded");
        assert_eq!(
            serde_json::to_string(&LogEventType::Failure).unwrap(),
            r#""failure""#
        );
    }
}
