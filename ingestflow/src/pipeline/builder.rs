//! Pipeline builder with validation.

use super::{StageDeclaration, StageSpec};
use crate::errors::PipelineValidationError;
use crate::schema::SchemaRegistry;
use crate::stages::Stage;
use std::collections::HashSet;
use std::sync::Arc;

/// Builder for creating validated pipelines.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<StageSpec>,
    final_contract: Option<String>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            final_contract: None,
        }
    }

    /// Appends a stage specification.
    #[must_use]
    pub fn stage(mut self, spec: StageSpec) -> Self {
        self.stages.push(spec);
        self
    }

    /// Appends a stage with its own name and schemas.
    #[must_use]
    pub fn add(self, runner: Arc<dyn Stage>) -> Self {
        self.stage(StageSpec::new(runner))
    }

    /// Checks the run's final payload against `schema_id` once every stage
    /// has been attempted.
    #[must_use]
    pub fn final_contract(mut self, schema_id: impl Into<String>) -> Self {
        self.final_contract = Some(schema_id.into());
        self
    }

    /// Validates the definition against a registry and builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline or a stage name is blank, the
    /// pipeline has no stages, two stages share a name, a timeout is zero, or
    /// a declared schema id is not registered.
    pub fn build(self, registry: &SchemaRegistry) -> Result<Pipeline, PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new(
                "Pipeline name cannot be empty or whitespace-only",
            ));
        }

        if self.stages.is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Pipeline '{}' has no stages",
                self.name
            ))
            .with_fix_hint("Add at least one stage before building"));
        }

        let mut seen = HashSet::new();
        for spec in &self.stages {
            if spec.name.trim().is_empty() {
                return Err(PipelineValidationError::new("Stage name cannot be empty")
                    .with_fix_hint("Give every stage a non-blank name"));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(PipelineValidationError::new(format!(
                    "Duplicate stage name '{}'",
                    spec.name
                ))
                .with_stages(vec![spec.name.clone()])
                .with_fix_hint("Register the second stage under a different name"));
            }
            if spec.timeout.is_some_and(|t| t.is_zero()) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' has a zero timeout",
                    spec.name
                ))
                .with_stages(vec![spec.name.clone()]));
            }
        }

        let mut unknown = Vec::new();
        let mut offenders = Vec::new();
        for spec in &self.stages {
            for id in [&spec.input_schema, &spec.output_schema] {
                if !registry.contains(id) {
                    if !unknown.contains(id) {
                        unknown.push(id.clone());
                    }
                    if !offenders.contains(&spec.name) {
                        offenders.push(spec.name.clone());
                    }
                }
            }
        }
        if let Some(id) = self.final_contract.as_ref().filter(|id| !registry.contains(id)) {
            if !unknown.contains(id) {
                unknown.push(id.clone());
            }
        }
        if !unknown.is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Unregistered schema ids: {}",
                unknown.join(", ")
            ))
            .with_stages(offenders)
            .with_fix_hint("Register every schema contract before building the pipeline"));
        }

        tracing::debug!(pipeline = %self.name, stages = self.stages.len(), "Built pipeline");
        Ok(Pipeline {
            name: self.name,
            stages: self.stages,
            final_contract: self.final_contract,
        })
    }
}

/// A validated, ordered sequence of stages.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    stages: Vec<StageSpec>,
    final_contract: Option<String>,
}

impl Pipeline {
    /// Pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stage specifications, in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Stage names, in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name.clone()).collect()
    }

    /// Contract the final payload is checked against, if any.
    #[must_use]
    pub fn final_contract(&self) -> Option<&str> {
        self.final_contract.as_deref()
    }

    /// Declarations of every stage.
    #[must_use]
    pub fn declarations(&self) -> Vec<StageDeclaration> {
        self.stages.iter().map(StageSpec::declaration).collect()
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false for a built pipeline.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
