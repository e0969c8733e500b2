//! Run orchestration.
//!
//! [`Runner`] drives one pipeline run at a time per call; any number of calls
//! may be in flight concurrently. [`CancellationToken`] stops a run at the
//! next stage boundary.

mod cancellation;
mod engine;
#[cfg(test)]
mod scenario_tests;

pub use cancellation::CancellationToken;
pub use engine::{Runner, RUN_INPUT};
