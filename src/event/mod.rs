//! Lifecycle events for a run.
//!
//! The engine reports every lifecycle moment of a run through an in-process
//! notification channel: callers subscribe per [`EventKind`] on the run
//! context, and the driver invokes the registered listeners synchronously
//! at each emission. Payload-carrying variants include the data needed to
//! display a meaningful message without reaching back into the context.

mod registry;

pub use registry::ListenerId;
pub(crate) use registry::ListenerRegistry;

use std::fmt;
use std::time::Duration;

/// The kinds of lifecycle events a run emits, used as subscription keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The run has started; stats are initialized.
    Start,
    /// The run has terminated on the success path (limit reached or stop
    /// requested). Not emitted when an error propagates.
    Stop,
    /// The run has been paused.
    Pause,
    /// The run is resuming from a paused state.
    Resume,
    /// A step attempt failed.
    Error,
    /// A failed attempt is about to be retried.
    Retry,
    /// An iteration completed successfully.
    Iteration,
}

impl EventKind {
    /// Returns the event name as emitted in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Stop => "stop",
            EventKind::Pause => "pause",
            EventKind::Resume => "resume",
            EventKind::Error => "error",
            EventKind::Retry => "retry",
            EventKind::Iteration => "iteration",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A lifecycle event, as delivered to listeners.
///
/// `T` is the work value type; only [`Event::Iteration`] carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<T> {
    /// The run has started.
    Start,
    /// The run has terminated on the success path.
    Stop,
    /// The run has been paused.
    Pause,
    /// The run is resuming.
    Resume,
    /// A step attempt failed.
    Error {
        /// The attempt number that failed (1-based within the iteration).
        attempt: u32,
        /// Rendered message of the step error.
        message: String,
    },
    /// A failed attempt is about to be retried.
    Retry {
        /// The upcoming attempt number (1-based within the iteration).
        attempt: u32,
        /// Delay applied before the retry attempt.
        delay: Duration,
        /// Rendered message of the step error being retried.
        message: String,
    },
    /// An iteration completed successfully.
    Iteration {
        /// The 1-based number of the iteration that just completed.
        iteration: u64,
        /// The value the iteration produced; also the new bridge value.
        value: T,
    },
}

impl<T> Event<T> {
    /// Creates a new `Error` event.
    pub(crate) fn error(attempt: u32, message: impl Into<String>) -> Self {
        Self::Error {
            attempt,
            message: message.into(),
        }
    }

    /// Creates a new `Retry` event.
    pub(crate) fn retry(attempt: u32, delay: Duration, message: impl Into<String>) -> Self {
        Self::Retry {
            attempt,
            delay,
            message: message.into(),
        }
    }

    /// Creates a new `Iteration` event.
    pub(crate) fn iteration(iteration: u64, value: T) -> Self {
        Self::Iteration { iteration, value }
    }

    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Start => EventKind::Start,
            Event::Stop => EventKind::Stop,
            Event::Pause => EventKind::Pause,
            Event::Resume => EventKind::Resume,
            Event::Error { .. } => EventKind::Error,
            Event::Retry { .. } => EventKind::Retry,
            Event::Iteration { .. } => EventKind::Iteration,
        }
    }
}
