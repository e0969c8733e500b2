//! JSON-lines audit trail.

use super::{AuditTrail, LogEvent, RunEvents};
use crate::errors::AuditError;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// Audit trail that appends one JSON object per line to a file.
///
/// Writes are serialised by a mutex and flushed per event, so a line is
/// never split between two events.
#[derive(Debug)]
pub struct JsonlAuditTrail {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditTrail {
    /// Opens (or creates) the log file in append mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every event in the file, in append order.
    ///
    /// Strict: the first unparseable line is reported as
    /// [`AuditError::Corrupt`].
    pub fn read_all(&self) -> Result<Vec<LogEvent>, AuditError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut events = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(&line).map_err(|e| AuditError::Corrupt {
                line: index + 1,
                message: e.to_string(),
            })?;
            events.push(event);
        }
        Ok(events)
    }

    /// Reads the events of one run, skipping lines that do not parse.
    ///
    /// A torn or foreign line is logged and dropped so that it cannot hide
    /// the rest of the trail.
    fn scan_run(&self, run_id: Uuid) -> Result<Vec<LogEvent>, AuditError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut events = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEvent>(&line) {
                Ok(event) if event.run_id == run_id => events.push(event),
                Ok(_) => {}
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping unreadable audit line"
                ),
            }
        }
        Ok(events)
    }
}

impl AuditTrail for JsonlAuditTrail {
    fn append(&self, event: LogEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');

        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }

    fn events_for(&self, run_id: Uuid) -> Result<RunEvents, AuditError> {
        Ok(RunEvents::new(self.scan_run(run_id)?))
    }
}
