//! Pipeline definition.
//!
//! A [`Pipeline`] is an ordered list of [`StageSpec`]s checked against a
//! [`SchemaRegistry`](crate::schema::SchemaRegistry) by [`PipelineBuilder`].

mod builder;
mod spec;

pub use builder::{Pipeline, PipelineBuilder};
pub use spec::{StageDeclaration, StageSpec};
