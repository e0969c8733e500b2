//! Error types for the ingestflow engine.
//!
//! Stage failures are never represented here: those are
//! [`FailureRecord`](crate::core::FailureRecord) values carried inside a
//! [`RunResult`](crate::core::RunResult). The types in this module cover
//! setup and programming mistakes (an invalid pipeline definition, a schema
//! registered twice, an unreadable audit log) that the caller must fix.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for ingestflow operations.
#[derive(Debug, Error)]
pub enum IngestflowError {
    /// A pipeline definition was rejected.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A schema registry operation failed.
    #[error("{0}")]
    Schema(#[from] SchemaRegistryError),

    /// The audit trail could not be written or read.
    #[error("{0}")]
    Audit(#[from] AuditError),

    /// Configuration could not be loaded or applied.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised when a pipeline definition fails validation.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            fix_hint: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("message".to_string(), serde_json::json!(self.message));
        map.insert("stages".to_string(), serde_json::json!(self.stages));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        map
    }
}

/// Errors raised by the schema registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaRegistryError {
    /// The schema id does not follow the `<name>.v<version>` convention.
    #[error("Invalid schema id '{id}': {reason}")]
    InvalidId {
        /// The offending id.
        id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A different contract is already registered under this id.
    #[error("Schema '{id}' is already registered with a different definition; register a new version instead")]
    VersionConflict {
        /// The conflicting id.
        id: String,
    },

    /// The contract declares a constraint that can never be evaluated.
    #[error("Schema '{id}' has an invalid constraint on field '{field}': {reason}")]
    InvalidConstraint {
        /// The schema id.
        id: String,
        /// The field carrying the constraint.
        field: String,
        /// Why the constraint is invalid.
        reason: String,
    },

    /// No contract is registered under this id.
    #[error("Unknown schema: {id}")]
    Unknown {
        /// The missing id.
        id: String,
    },
}

impl SchemaRegistryError {
    /// Creates an unknown-schema error.
    #[must_use]
    pub fn unknown(id: impl Into<String>) -> Self {
        Self::Unknown { id: id.into() }
    }

    /// Creates an invalid-id error.
    #[must_use]
    pub fn invalid_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidId {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by audit trail sinks.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The underlying storage failed.
    #[error("Audit IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An event could not be encoded or decoded.
    #[error("Audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored line could not be parsed back into an event.
    #[error("Corrupt audit record at line {line}: {message}")]
    Corrupt {
        /// 1-based line number in the log.
        line: usize,
        /// Parser message.
        message: String,
    },

    /// The sink refused the event.
    #[error("Audit sink unavailable: {0}")]
    Unavailable(String),
}
