//! Runner configuration.

use crate::audit::{AuditTrail, InMemoryAuditTrail, JsonlAuditTrail, LoggingAuditTrail};
use crate::errors::IngestflowError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// Configuration for a [`Runner`](crate::runner::Runner).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Time bound for stages that declare none, in milliseconds.
    #[serde(default)]
    pub stage_timeout_ms: Option<u64>,
    /// Time bound for AI collaborator calls, in milliseconds.
    #[serde(default = "default_ai_timeout_ms")]
    pub ai_timeout_ms: u64,
    /// Add a SHA-256 digest of each stage output to its success event.
    #[serde(default = "default_record_payload_digests")]
    pub record_payload_digests: bool,
    /// Append audit events to this JSON-lines file instead of memory.
    #[serde(default)]
    pub audit_log_path: Option<PathBuf>,
    /// Mirror audit events to `tracing`.
    #[serde(default)]
    pub mirror_audit_to_tracing: bool,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_ai_timeout_ms() -> u64 {
    30_000
}

fn default_record_payload_digests() -> bool {
    true
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            stage_timeout_ms: None,
            ai_timeout_ms: default_ai_timeout_ms(),
            record_payload_digests: default_record_payload_digests(),
            audit_log_path: None,
            mirror_audit_to_tracing: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, IngestflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, IngestflowError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks that timeouts are non-zero.
    pub fn validate(&self) -> Result<(), IngestflowError> {
        if self.ai_timeout_ms == 0 {
            return Err(IngestflowError::Config(
                "ai_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.stage_timeout_ms == Some(0) {
            return Err(IngestflowError::Config(
                "stage_timeout_ms must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the default stage timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Sets the AI call timeout.
    #[must_use]
    pub fn with_ai_timeout(mut self, timeout: Duration) -> Self {
        self.ai_timeout_ms = duration_ms(timeout);
        self
    }

    /// Enables or disables payload digests.
    #[must_use]
    pub fn with_payload_digests(mut self, enabled: bool) -> Self {
        self.record_payload_digests = enabled;
        self
    }

    /// Sets the JSON-lines audit log path.
    #[must_use]
    pub fn with_audit_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_log_path = Some(path.into());
        self
    }

    /// Mirrors audit events to `tracing`.
    #[must_use]
    pub fn with_audit_mirroring(mut self, enabled: bool) -> Self {
        self.mirror_audit_to_tracing = enabled;
        self
    }

    /// Sets the logging configuration.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Default stage timeout.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_ms.map(Duration::from_millis)
    }

    /// AI call timeout.
    #[must_use]
    pub fn ai_timeout(&self) -> Duration {
        Duration::from_millis(self.ai_timeout_ms)
    }

    /// Builds the configured audit trail.
    pub fn audit_trail(&self) -> Result<Arc<dyn AuditTrail>, IngestflowError> {
        let trail: Arc<dyn AuditTrail> = match (&self.audit_log_path, self.mirror_audit_to_tracing) {
            (Some(path), true) => Arc::new(LoggingAuditTrail::new(JsonlAuditTrail::open(path)?)),
            (Some(path), false) => Arc::new(JsonlAuditTrail::open(path)?),
            (None, true) => Arc::new(LoggingAuditTrail::new(InMemoryAuditTrail::new())),
            (None, false) => Arc::new(InMemoryAuditTrail::new()),
        };
        Ok(trail)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{LogEvent, LogEventType};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.ai_timeout(), Duration::from_secs(30));
        assert!(config.stage_timeout().is_none());
        assert!(config.record_payload_digests);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_json_with_partial_fields() {
        let config = RunnerConfig::from_json_str(
            r#"{"stage_timeout_ms": 5000, "logging": {"json": true}}"#,
        )
        .unwrap();

        assert_eq!(config.stage_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.ai_timeout_ms, 30_000);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_rejects_zero_timeouts() {
        let err = RunnerConfig::from_json_str(r#"{"ai_timeout_ms": 0}"#).unwrap_err();
        assert!(matches!(err, IngestflowError::Config(_)));
        assert!(RunnerConfig::from_json_str(r#"{"stage_timeout_ms": 0}"#).is_err());
        assert!(RunnerConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_builder() {
        let config = RunnerConfig::new()
            .with_stage_timeout(Duration::from_millis(250))
            .with_ai_timeout(Duration::from_secs(5))
            .with_payload_digests(false)
            .with_audit_mirroring(true);

        assert_eq!(config.stage_timeout_ms, Some(250));
        assert_eq!(config.ai_timeout_ms, 5000);
        assert!(!config.record_payload_digests);
        assert!(config.mirror_audit_to_tracing);
    }

    #[test]
    fn test_from_file_and_jsonl_trail() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("audit.jsonl");
        let config_path = dir.path().join("runner.json");
        std::fs::write(
            &config_path,
            serde_json::to_string(&RunnerConfig::new().with_audit_log_path(&log_path)).unwrap(),
        )
        .unwrap();

        let config = RunnerConfig::from_file(&config_path).unwrap();
        let trail = config.audit_trail().unwrap();
        let run_id = Uuid::now_v7();
        trail.append(LogEvent::new(run_id, LogEventType::Start, "Run started")).unwrap();

        assert!(log_path.exists());
        assert_eq!(trail.events_for(run_id).unwrap().len(), 1);
    }
}
