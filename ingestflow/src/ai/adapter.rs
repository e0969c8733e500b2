//! Validated boundary around one AI collaborator call.

use super::{AiCollaborator, AiRequest, PromptTemplate};
use crate::config::RunnerConfig;
use crate::core::{FailureRecord, Payload};
use crate::schema::{validate, FieldSpec, FieldType, SchemaContract};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timeout applied to collaborator calls unless configured otherwise.
pub const DEFAULT_AI_TIMEOUT: Duration = Duration::from_secs(30);

/// The standard response contract, `ai_response.v1`.
///
/// `content` and `explanation` are required non-empty strings and
/// `confidence` is a required number in `[0, 1]`.
#[must_use]
pub fn ai_response_contract() -> SchemaContract {
    SchemaContract::new("ai_response", 1)
        .field(FieldSpec::required("content", FieldType::Any).non_empty())
        .field(FieldSpec::required("confidence", FieldType::Number).in_range(Some(0.0), Some(1.0)))
        .field(FieldSpec::required("explanation", FieldType::String).non_empty())
        .with_description("Structured answer returned by an AI collaborator")
}

/// Wraps exactly one external AI call behind a timeout and a response
/// contract.
///
/// A response leaves the adapter only after it parsed as JSON and satisfied
/// the contract. Anything else becomes a [`FailureRecord`]:
///
/// | outcome | kind |
/// |---|---|
/// | timeout expired | `timeout` |
/// | collaborator error | `external_call_error` |
/// | response is not JSON | `external_call_error` |
/// | response violates the contract | `validation_error` |
#[derive(Clone)]
pub struct AiBoundaryAdapter {
    task: String,
    collaborator: Arc<dyn AiCollaborator>,
    contract: Arc<SchemaContract>,
    prompt: PromptTemplate,
    timeout: Duration,
}

impl AiBoundaryAdapter {
    /// Creates an adapter with the default timeout.
    #[must_use]
    pub fn new(
        task: impl Into<String>,
        collaborator: Arc<dyn AiCollaborator>,
        contract: Arc<SchemaContract>,
        prompt: PromptTemplate,
    ) -> Self {
        Self {
            task: task.into(),
            collaborator,
            contract,
            prompt,
            timeout: DEFAULT_AI_TIMEOUT,
        }
    }

    /// Sets the call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Takes the call timeout from `config.ai_timeout_ms`.
    #[must_use]
    pub fn with_config(mut self, config: &RunnerConfig) -> Self {
        self.timeout = config.ai_timeout();
        self
    }

    /// Task name.
    #[must_use]
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Response contract.
    #[must_use]
    pub fn contract(&self) -> &SchemaContract {
        &self.contract
    }

    /// Call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Builds the request sent for a given input.
    #[must_use]
    pub fn build_request(&self, input: &Payload) -> AiRequest {
        AiRequest {
            task: self.task.clone(),
            prompt_id: self.prompt.id.clone(),
            prompt_version: self.prompt.version,
            prompt: self.prompt.render(input),
            input: input.clone(),
        }
    }

    /// Performs the call and returns the validated response.
    ///
    /// Failures are attributed to `stage`.
    pub async fn invoke(&self, stage: &str, input: &Payload) -> Result<Payload, FailureRecord> {
        let request = self.build_request(input);
        let started = Instant::now();
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);

        let outcome = tokio::time::timeout(self.timeout, self.collaborator.complete(&request)).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let raw = match outcome {
            Err(_) => {
                return Err(self.annotate(
                    FailureRecord::timeout(
                        stage,
                        format!("collaborator for task '{}' did not answer within {timeout_ms}ms", self.task),
                    )
                    .with_context("timeout_ms", json!(timeout_ms)),
                    &request,
                    elapsed_ms,
                ));
            }
            Ok(Err(err)) => {
                return Err(self.annotate(
                    FailureRecord::external_call(stage, err.to_string()),
                    &request,
                    elapsed_ms,
                ));
            }
            Ok(Ok(raw)) => raw,
        };

        let value: Payload = match serde_json::from_str(strip_code_fences(&raw)) {
            Ok(value) => value,
            Err(err) => {
                return Err(self.annotate(
                    FailureRecord::external_call(
                        stage,
                        format!("collaborator for task '{}' returned malformed JSON: {err}", self.task),
                    )
                    .with_fix("Instruct the collaborator to answer with a single JSON object")
                    .with_context("response_bytes", json!(raw.len())),
                    &request,
                    elapsed_ms,
                ));
            }
        };

        let contract_id = self.contract.id();
        if let Some(record) = validate(&value, &self.contract).into_failure(stage, &contract_id) {
            return Err(self.annotate(
                record
                    .with_fix(format!("Tighten prompt '{}' so answers satisfy '{contract_id}'", self.prompt.id))
                    .with_context("response_bytes", json!(raw.len())),
                &request,
                elapsed_ms,
            ));
        }

        tracing::debug!(
            stage,
            task = %self.task,
            prompt_id = %self.prompt.id,
            elapsed_ms,
            "AI response accepted"
        );
        Ok(value)
    }

    fn annotate(&self, record: FailureRecord, request: &AiRequest, elapsed_ms: u64) -> FailureRecord {
        record
            .with_context("task", json!(request.task))
            .with_context("prompt_id", json!(request.prompt_id))
            .with_context("prompt_version", json!(request.prompt_version))
            .with_context("elapsed_ms", json!(elapsed_ms))
    }
}

impl fmt::Debug for AiBoundaryAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiBoundaryAdapter")
            .field("task", &self.task)
            .field("contract", &self.contract.id())
            .field("prompt", &self.prompt.id)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Strips surrounding whitespace and a markdown code fence.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
