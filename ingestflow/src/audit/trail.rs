//! Audit trail trait and the in-memory implementation.

use super::{LogEvent, LogEventType};
use crate::errors::AuditError;
use dashmap::DashMap;
use std::fmt::Debug;
use std::sync::Arc;
use uuid::Uuid;

/// Append-only store of [`LogEvent`]s.
///
/// Appends from concurrent runs may interleave, but each event is stored as
/// one atomic unit and events are never rewritten or removed.
pub trait AuditTrail: Send + Sync + Debug {
    /// Appends one event.
    fn append(&self, event: LogEvent) -> Result<(), AuditError>;

    /// Returns the events of a run in append order.
    fn events_for(&self, run_id: Uuid) -> Result<RunEvents, AuditError>;
}

/// Point-in-time snapshot of one run's events, in append order.
///
/// The snapshot is taken when [`AuditTrail::events_for`] is called: events
/// appended afterwards are not visible through it. Call `events_for` again
/// for a fresh view. Cloning is cheap and [`iter`](Self::iter) restarts from
/// the first event every time.
#[derive(Debug, Clone, PartialEq)]
pub struct RunEvents {
    events: Arc<[LogEvent]>,
}

impl Default for RunEvents {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RunEvents {
    /// Wraps a list of events.
    #[must_use]
    pub fn new(events: Vec<LogEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }

    /// Iterates the events; may be called any number of times.
    pub fn iter(&self) -> std::slice::Iter<'_, LogEvent> {
        self.events.iter()
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the run has no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events of a given type.
    #[must_use]
    pub fn of_type(&self, event_type: LogEventType) -> Vec<&LogEvent> {
        self.iter().filter(|e| e.event_type == event_type).collect()
    }

    /// Events attributed to a stage.
    #[must_use]
    pub fn for_stage(&self, stage: &str) -> Vec<&LogEvent> {
        self.iter().filter(|e| e.stage.as_deref() == Some(stage)).collect()
    }

    /// The last event, which for a finished run is the terminal event.
    #[must_use]
    pub fn last(&self) -> Option<&LogEvent> {
        self.events.last()
    }

    /// Events as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[LogEvent] {
        &self.events
    }
}

impl<'a> IntoIterator for &'a RunEvents {
    type Item = &'a LogEvent;
    type IntoIter = std::slice::Iter<'a, LogEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Audit trail kept in a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryAuditTrail {
    runs: DashMap<Uuid, Vec<LogEvent>>,
}

impl InMemoryAuditTrail {
    /// Creates an empty trail.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every run with at least one event.
    #[must_use]
    pub fn run_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.runs.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    /// Total number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.iter().map(|entry| entry.value().len()).sum()
    }

    /// Returns true if nothing was stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

impl AuditTrail for InMemoryAuditTrail {
    fn append(&self, event: LogEvent) -> Result<(), AuditError> {
        self.runs.entry(event.run_id).or_default().push(event);
        Ok(())
    }

    fn events_for(&self, run_id: Uuid) -> Result<RunEvents, AuditError> {
        Ok(self
            .runs
            .get(&run_id)
            .map(|events| RunEvents::new(events.value().clone()))
            .unwrap_or_default())
    }
}
