//! Stage registration specifications.

use crate::stages::Stage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Specification for a single stage in a pipeline.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The unique name of the stage within its pipeline.
    pub name: String,
    /// Schema id of the accepted payload.
    pub input_schema: String,
    /// Schema id of the produced payload.
    pub output_schema: String,
    /// Whether a failure of this stage aborts the run.
    pub hard_dependency: bool,
    /// Time bound for one execution of the stage.
    pub timeout: Option<Duration>,
    /// What downstream stages lose when this stage fails.
    pub impact: Option<String>,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
}

impl StageSpec {
    /// Creates a specification that takes its name and schemas from the stage.
    #[must_use]
    pub fn new(runner: Arc<dyn Stage>) -> Self {
        Self {
            name: runner.name().to_string(),
            input_schema: runner.input_schema().to_string(),
            output_schema: runner.output_schema().to_string(),
            hard_dependency: false,
            timeout: None,
            impact: None,
            runner,
        }
    }

    /// Registers the stage under a different name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Marks the stage as a hard dependency.
    #[must_use]
    pub fn hard_dependency(mut self) -> Self {
        self.hard_dependency = true;
        self
    }

    /// Sets the per-stage timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Describes what is lost when the stage fails.
    #[must_use]
    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.impact = Some(impact.into());
        self
    }

    /// The impact text used in failure records and degraded events.
    #[must_use]
    pub fn impact_text(&self) -> String {
        self.impact.clone().unwrap_or_else(|| {
            format!(
                "'{}' output ({}) is unavailable to downstream stages",
                self.name, self.output_schema
            )
        })
    }

    /// The serializable part of the specification.
    #[must_use]
    pub fn declaration(&self) -> StageDeclaration {
        StageDeclaration {
            name: self.name.clone(),
            input_schema: self.input_schema.clone(),
            output_schema: self.output_schema.clone(),
            hard_dependency: self.hard_dependency,
        }
    }
}

/// `(name, input schema, output schema, hard dependency)` of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDeclaration {
    /// Stage name.
    pub name: String,
    /// Input schema id.
    pub input_schema: String,
    /// Output schema id.
    pub output_schema: String,
    /// Whether a failure aborts the run.
    pub hard_dependency: bool,
}
