//! Per-run execution statistics.
//!
//! One [`RunStats`] record exists per run, written exclusively by the
//! engine and exposed to callers and step functions as a snapshot through
//! the run context.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Statistics for a single run.
///
/// `executions` counts completed successful iterations. A final,
/// non-retried failure advances the run's iteration count without touching
/// `executions`; the divergence is observable in the error case only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run terminated on the success path. `None` while running
    /// and after an error abort, which skips termination bookkeeping.
    pub completed_at: Option<DateTime<Utc>>,
    /// Number of successful iterations.
    pub executions: u64,
    /// Number of failed step attempts, retried or not.
    pub errors: u64,
    /// Number of retry attempts performed.
    pub retries: u64,
    /// Cumulative execution time of successful iterations.
    pub total_execution_time: Duration,
    /// Mean execution time of successful iterations.
    pub average_execution_time: Duration,
    /// Whether the run is currently executing.
    pub is_running: bool,
    /// Whether the run is currently paused.
    pub is_paused: bool,
}

impl RunStats {
    /// Creates a fresh record stamped with the current time.
    pub(crate) fn new() -> Self {
        Self {
            started_at: Utc::now(),
            completed_at: None,
            executions: 0,
            errors: 0,
            retries: 0,
            total_execution_time: Duration::ZERO,
            average_execution_time: Duration::ZERO,
            is_running: false,
            is_paused: false,
        }
    }

    /// Stamps the start of the run.
    pub(crate) fn mark_started(&mut self) {
        self.started_at = Utc::now();
        self.is_running = true;
    }

    /// Stamps the termination of the run.
    pub(crate) fn mark_stopped(&mut self) {
        self.completed_at = Some(Utc::now());
        self.is_running = false;
    }

    /// Adds one successful iteration's execution time and recomputes the
    /// mean.
    pub(crate) fn record_execution(&mut self, elapsed: Duration) {
        self.executions += 1;
        self.total_execution_time += elapsed;
        let mean_nanos = self.total_execution_time.as_nanos() / u128::from(self.executions);
        self.average_execution_time = Duration::from_nanos(mean_nanos as u64);
    }

    /// Counts one failed step attempt.
    pub(crate) fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Counts one retry attempt.
    pub(crate) fn record_retry(&mut self) {
        self.retries += 1;
    }

    /// Sets the paused flag.
    pub(crate) fn set_paused(&mut self, paused: bool) {
        self.is_paused = paused;
    }

    /// Wall-clock duration of the run, once terminated.
    pub fn run_duration(&self) -> Option<Duration> {
        self.completed_at
            .map(|completed| (completed - self.started_at).to_std().unwrap_or(Duration::ZERO))
    }
}
