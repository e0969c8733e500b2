//! Tracing subscriber installation and timing helpers.

use crate::config::LoggingConfig;
use crate::errors::IngestflowError;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level. Fails if a global subscriber
/// is already installed or the level is not a valid filter directive.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), IngestflowError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| IngestflowError::Config(format!("invalid log level '{}': {e}", config.level)))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let installed = if config.json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| IngestflowError::Config(format!("could not install subscriber: {e}")))
}

/// Measures the wall-clock duration of a stage or run.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
}

impl SpanTimer {
    /// Starts a timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time in whole milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
