//! Stage trait and implementations.
//!
//! Stages are the units of work in an ingestflow pipeline. A stage reads the
//! payload produced by its predecessor and returns either a new payload or a
//! [`FailureRecord`]. Stages never signal failure by panicking.

mod retry;

pub use retry::{BackoffStrategy, JitterStrategy, RetryConfig, RetryingStage};

use crate::core::{FailureRecord, Payload};
use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use uuid::Uuid;

/// Execution context handed to a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageContext {
    /// Run the stage executes in.
    pub run_id: Uuid,
    /// Pipeline name.
    pub pipeline: String,
    /// Name of the executing stage.
    pub stage: String,
    /// 1-based attempt number, above 1 only inside a [`RetryingStage`].
    pub attempt: u32,
}

impl StageContext {
    /// Creates a context for the first attempt of a stage.
    #[must_use]
    pub fn new(run_id: Uuid, pipeline: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            run_id,
            pipeline: pipeline.into(),
            stage: stage.into(),
            attempt: 1,
        }
    }

    /// Sets the attempt number.
    #[must_use]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }
}

/// Trait for pipeline stages.
///
/// A stage declares the schema ids of the payload it accepts and the payload
/// it produces. The runner validates both sides; the stage only transforms.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Schema id the input payload must satisfy.
    fn input_schema(&self) -> &str;

    /// Schema id the output payload must satisfy.
    fn output_schema(&self) -> &str;

    /// Executes the stage.
    ///
    /// Internal faults must be converted into a [`FailureRecord`] with a
    /// cause and at least one suggested fix before returning.
    async fn execute(&self, ctx: &StageContext, input: &Payload) -> Result<Payload, FailureRecord>;
}

/// Converts an arbitrary error into a failure record for `stage`.
///
/// A [`FailureRecord`] carried inside the error is returned unchanged.
pub(crate) fn failure_from_anyhow(stage: &str, err: anyhow::Error) -> FailureRecord {
    match err.downcast::<FailureRecord>() {
        Ok(record) => record,
        Err(err) => FailureRecord::internal(stage, format!("{err:#}")).with_trace(format!("{err:?}")),
    }
}

/// A stage backed by a synchronous closure.
pub struct FnStage<F>
where
    F: Fn(&StageContext, &Payload) -> anyhow::Result<Payload> + Send + Sync,
{
    name: String,
    input_schema: String,
    output_schema: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageContext, &Payload) -> anyhow::Result<Payload> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(
        name: impl Into<String>,
        input_schema: impl Into<String>,
        output_schema: impl Into<String>,
        func: F,
    ) -> Self {
        Self {
            name: name.into(),
            input_schema: input_schema.into(),
            output_schema: output_schema.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&StageContext, &Payload) -> anyhow::Result<Payload> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("name", &self.name)
            .field("input_schema", &self.input_schema)
            .field("output_schema", &self.output_schema)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&StageContext, &Payload) -> anyhow::Result<Payload> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn input_schema(&self) -> &str {
        &self.input_schema
    }

    fn output_schema(&self) -> &str {
        &self.output_schema
    }

    async fn execute(&self, ctx: &StageContext, input: &Payload) -> Result<Payload, FailureRecord> {
        (self.func)(ctx, input).map_err(|err| failure_from_anyhow(&self.name, err))
    }
}

/// A stage backed by an async closure.
///
/// The closure receives owned copies of the context and payload.
pub struct AsyncFnStage<F, Fut>
where
    F: Fn(StageContext, Payload) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Payload>> + Send,
{
    name: String,
    input_schema: String,
    output_schema: String,
    func: F,
    _future: PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnStage<F, Fut>
where
    F: Fn(StageContext, Payload) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Payload>> + Send,
{
    /// Creates a new async function-based stage.
    pub fn new(
        name: impl Into<String>,
        input_schema: impl Into<String>,
        output_schema: impl Into<String>,
        func: F,
    ) -> Self {
        Self {
            name: name.into(),
            input_schema: input_schema.into(),
            output_schema: output_schema.into(),
            func,
            _future: PhantomData,
        }
    }
}

impl<F, Fut> Debug for AsyncFnStage<F, Fut>
where
    F: Fn(StageContext, Payload) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Payload>> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnStage")
            .field("name", &self.name)
            .field("input_schema", &self.input_schema)
            .field("output_schema", &self.output_schema)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> Stage for AsyncFnStage<F, Fut>
where
    F: Fn(StageContext, Payload) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Payload>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn input_schema(&self) -> &str {
        &self.input_schema
    }

    fn output_schema(&self) -> &str {
        &self.output_schema
    }

    async fn execute(&self, ctx: &StageContext, input: &Payload) -> Result<Payload, FailureRecord> {
        (self.func)(ctx.clone(), input.clone())
            .await
            .map_err(|err| failure_from_anyhow(&self.name, err))
    }
}

/// A stage that returns its input unchanged.
#[derive(Debug, Clone)]
pub struct PassthroughStage {
    name: String,
    schema: String,
}

impl PassthroughStage {
    /// Creates a passthrough stage whose input and output share one schema.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
        }
    }
}

#[async_trait]
impl Stage for PassthroughStage {
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
        Ok(input.clone())
    }
}
