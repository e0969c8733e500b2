//! A stage whose work is one AI call.

use super::AiBoundaryAdapter;
use crate::core::{FailureRecord, Payload};
use crate::stages::{Stage, StageContext};
use async_trait::async_trait;

/// Stage that delegates to an [`AiBoundaryAdapter`].
///
/// By default the validated response is the stage output. With
/// [`nest_under`](Self::nest_under) the response is inserted into a copy of
/// the input object instead, so earlier fields travel on.
#[derive(Debug, Clone)]
pub struct AiStage {
    name: String,
    input_schema: String,
    output_schema: String,
    adapter: AiBoundaryAdapter,
    nest_key: Option<String>,
}

impl AiStage {
    /// Creates an AI stage whose output schema is the adapter's contract.
    #[must_use]
    pub fn new(name: impl Into<String>, input_schema: impl Into<String>, adapter: AiBoundaryAdapter) -> Self {
        let output_schema = adapter.contract().id();
        Self {
            name: name.into(),
            input_schema: input_schema.into(),
            output_schema,
            adapter,
            nest_key: None,
        }
    }

    /// Nests the response under `key` of the input object.
    ///
    /// The output schema should then describe the merged object; set it with
    /// [`with_output_schema`](Self::with_output_schema).
    #[must_use]
    pub fn nest_under(mut self, key: impl Into<String>) -> Self {
        self.nest_key = Some(key.into());
        self
    }

    /// Overrides the output schema id.
    #[must_use]
    pub fn with_output_schema(mut self, schema: impl Into<String>) -> Self {
        self.output_schema = schema.into();
        self
    }

    /// The wrapped adapter.
    #[must_use]
    pub fn adapter(&self) -> &AiBoundaryAdapter {
        &self.adapter
    }
}

#[async_trait]
impl Stage for AiStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_schema(&self) -> &str {
        &self.input_schema
    }

    fn output_schema(&self) -> &str {
        &self.output_schema
    }

    async fn execute(&self, _ctx: &StageContext, input: &Payload) -> Result<Payload, FailureRecord> {
        let response = self.adapter.invoke(&self.name, input).await?;

        let Some(key) = &self.nest_key else {
            return Ok(response);
        };
        let Payload::Object(fields) = input else {
            return Err(FailureRecord::internal(
                &self.name,
                format!("cannot nest the AI response under '{key}': input is not an object"),
            ));
        };
        let mut merged = fields.clone();
        merged.insert(key.clone(), response);
        Ok(Payload::Object(merged))
    }
}
