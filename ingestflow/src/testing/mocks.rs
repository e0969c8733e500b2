//! Mock stages, collaborators and audit trails.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::ai::{AiCollaborator, AiRequest, CollaboratorError};
use crate::audit::{AuditTrail, LogEvent, RunEvents};
use crate::core::{FailureRecord, Payload};
use crate::errors::AuditError;
use crate::stages::{Stage, StageContext};

/// A stage that always returns the same payload.
#[derive(Debug)]
pub struct StaticStage {
    name: String,
    input_schema: String,
    output_schema: String,
    output: Payload,
    calls: AtomicUsize,
}

impl StaticStage {
    /// Creates a stage that returns `output`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        input_schema: impl Into<String>,
        output_schema: impl Into<String>,
        output: Payload,
    ) -> Self {
        Self {
            name: name.into(),
            input_schema: input_schema.into(),
            output_schema: output_schema.into(),
            output,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of executions.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for StaticStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_schema(&self) -> &str {
        &self.input_schema
    }

    fn output_schema(&self) -> &str {
        &self.output_schema
    }

    async fn execute(&self, _ctx: &StageContext, _input: &Payload) -> Result<Payload, FailureRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

/// A stage that always fails with the same record.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    schema: String,
    record: FailureRecord,
    calls: AtomicUsize,
}

impl FailingStage {
    /// Creates a stage that returns `record`.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: impl Into<String>, record: FailureRecord) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            record,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a stage that fails with an internal error.
    #[must_use]
    pub fn internal(name: impl Into<String>, schema: impl Into<String>, cause: impl Into<String>) -> Self {
        let name = name.into();
        let record = FailureRecord::internal(&name, cause);
        Self::new(name, schema, record)
    }

    /// Number of executions.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_schema(&self) -> &str {
        &self.schema
    }

    fn output_schema(&self) -> &str {
        &self.schema
    }

    async fn execute(&self, _ctx: &StageContext, _input: &Payload) -> Result<Payload, FailureRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.record.clone())
    }
}

/// A stage that panics instead of returning a failure record.
#[derive(Debug)]
pub struct PanickingStage {
    name: String,
    schema: String,
    message: String,
}

impl PanickingStage {
    /// Creates a stage that panics with `message`.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Stage for PanickingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_schema(&self) -> &str {
        &self.schema
    }

    fn output_schema(&self) -> &str {
        &self.schema
    }

    #[allow(clippy::panic)]
    async fn execute(&self, _ctx: &StageContext, _input: &Payload) -> Result<Payload, FailureRecord> {
        panic!("{}", self.message)
    }
}

/// A stage that sleeps before passing its input through.
#[derive(Debug)]
pub struct SlowStage {
    name: String,
    schema: String,
    delay: Duration,
}

impl SlowStage {
    /// Creates a new slow stage.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            delay,
        }
    }

    /// Creates a slow stage with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, schema: impl Into<String>, ms: u64) -> Self {
        Self::new(name, schema, Duration::from_millis(ms))
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_schema(&self) -> &str {
        &self.schema
    }

    fn output_schema(&self) -> &str {
        &self.schema
    }

    async fn execute(&self, _ctx: &StageContext, input: &Payload) -> Result<Payload, FailureRecord> {
        tokio::time::sleep(self.delay).await;
        Ok(input.clone())
    }
}

/// A passthrough stage that records every input and context it receives.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    schema: String,
    inputs: Mutex<Vec<Payload>>,
    run_ids: Mutex<Vec<Uuid>>,
}

impl RecordingStage {
    /// Creates a new recording stage.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            inputs: Mutex::new(Vec::new()),
            run_ids: Mutex::new(Vec::new()),
        }
    }

    /// Inputs received, in call order.
    #[must_use]
    pub fn inputs(&self) -> Vec<Payload> {
        self.inputs.lock().clone()
    }

    /// Run ids seen, in call order.
    #[must_use]
    pub fn run_ids(&self) -> Vec<Uuid> {
        self.run_ids.lock().clone()
    }

    /// Number of executions.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inputs.lock().len()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_schema(&self) -> &str {
        &self.schema
    }

    fn output_schema(&self) -> &str {
        &self.schema
    }

    async fn execute(&self, ctx: &StageContext, input: &Payload) -> Result<Payload, FailureRecord> {
        self.inputs.lock().push(input.clone());
        self.run_ids.lock().push(ctx.run_id);
        Ok(input.clone())
    }
}

/// An AI collaborator that replays scripted answers in order.
///
/// Once the script is exhausted every call fails with
/// [`CollaboratorError::Unusable`].
#[derive(Debug, Default)]
pub struct ScriptedCollaborator {
    script: Mutex<VecDeque<Result<String, CollaboratorError>>>,
    requests: Mutex<Vec<AiRequest>>,
    delay: Option<Duration>,
}

impl ScriptedCollaborator {
    /// Creates a collaborator with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw response.
    #[must_use]
    pub fn respond(self, raw: impl Into<String>) -> Self {
        self.script.lock().push_back(Ok(raw.into()));
        self
    }

    /// Appends an error.
    #[must_use]
    pub fn fail(self, error: CollaboratorError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    /// Sleeps before every answer.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<AiRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AiCollaborator for ScriptedCollaborator {
    async fn complete(&self, request: &AiRequest) -> Result<String, CollaboratorError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(CollaboratorError::Unusable("script exhausted".to_string())))
    }
}

/// An audit trail whose appends always fail.
#[derive(Debug, Default)]
pub struct FailingAuditTrail {
    attempts: AtomicUsize,
}

impl FailingAuditTrail {
    /// Creates a new failing trail.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rejected appends.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl AuditTrail for FailingAuditTrail {
    fn append(&self, _event: LogEvent) -> Result<(), AuditError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AuditError::Unavailable("audit sink offline".to_string()))
    }

    fn events_for(&self, _run_id: Uuid) -> Result<RunEvents, AuditError> {
        Err(AuditError::Unavailable("audit sink offline".to_string()))
    }
}
