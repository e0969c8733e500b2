//! Run log and audit trail.
//!
//! Every state transition of a run is appended as a [`LogEvent`] to an
//! [`AuditTrail`]. Trails are append-only and can be queried per run.

mod event;
mod jsonl;
mod logging;
mod trail;

pub use event::{payload_digest, redact, redact_failure, LogEvent, LogEventType, REDACTED};
pub use jsonl::JsonlAuditTrail;
pub use logging::LoggingAuditTrail;
pub use trail::{AuditTrail, InMemoryAuditTrail, RunEvents};
