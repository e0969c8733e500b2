//! Schema contracts and payload validation.
//!
//! A [`SchemaContract`] describes the shape a payload must have at a stage
//! boundary. Contracts are registered in a [`SchemaRegistry`] under an id of
//! the form `<name>.v<version>` and checked with the pure [`validate`]
//! function.

mod contract;
mod registry;
pub mod typed;
mod validator;

pub use contract::{Constraint, FieldSpec, FieldType, SchemaContract};
pub use registry::{is_valid_schema_id, SchemaRegistry};
pub use validator::{validate, ValidationOutcome, Violation};
