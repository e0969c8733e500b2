//! Audit trail that mirrors events to `tracing`.

use super::{AuditTrail, LogEvent, LogEventType, RunEvents};
use crate::errors::AuditError;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Wraps another trail and logs every appended event.
///
/// Start and success events log at `info`, degraded at `warn`, failure at
/// `error`. Storage is delegated to the inner trail.
#[derive(Debug)]
pub struct LoggingAuditTrail<T> {
    inner: T,
}

impl<T: AuditTrail> LoggingAuditTrail<T> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// The wrapped trail.
    #[must_use]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn log(event: &LogEvent) {
        let stage = event.stage.as_deref().unwrap_or("-");
        match event.event_type {
            LogEventType::Start | LogEventType::Success => info!(
                run_id = %event.run_id,
                sequence = event.sequence,
                stage,
                event_type = %event.event_type,
                metadata = ?event.metadata,
                "{}", event.message
            ),
            LogEventType::Degraded => warn!(
                run_id = %event.run_id,
                sequence = event.sequence,
                stage,
                event_type = %event.event_type,
                metadata = ?event.metadata,
                "{}", event.message
            ),
            LogEventType::Failure => error!(
                run_id = %event.run_id,
                sequence = event.sequence,
                stage,
                event_type = %event.event_type,
                metadata = ?event.metadata,
                "{}", event.message
            ),
        }
    }
}

impl<T: AuditTrail> AuditTrail for LoggingAuditTrail<T> {
    fn append(&self, event: LogEvent) -> Result<(), AuditError> {
        Self::log(&event);
        self.inner.append(event)
    }

    fn events_for(&self, run_id: Uuid) -> Result<RunEvents, AuditError> {
        self.inner.events_for(run_id)
    }
}
