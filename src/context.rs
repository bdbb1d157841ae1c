//! Shared run state handle.
//!
//! A [`RunContext`] is a cheap clone over the state of one run: the
//! iteration count, the bridge slot, statistics, the listener registry,
//! and the pause gate. The engine hands a clone to the step on every
//! invocation; callers keep their own clone for external control.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::event::{Event, EventKind, ListenerId, ListenerRegistry};
use crate::pause::PauseGate;
use crate::stats::RunStats;

/// Handle to the shared state of a single run.
///
/// Clones share state. The handle is `Send + Sync` whenever `T: Send`,
/// so it can move freely into step futures and listener callbacks.
#[derive(Debug)]
pub struct RunContext<T> {
    inner: Arc<ContextInner<T>>,
}

impl<T> Clone for RunContext<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ContextInner<T> {
    iterations: AtomicU64,
    bridge: Mutex<Option<T>>,
    stats: RwLock<RunStats>,
    listeners: ListenerRegistry<T>,
    gate: PauseGate,
}

impl<T> std::fmt::Debug for ContextInner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextInner")
            .field("iterations", &self.iterations)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl<T> RunContext<T> {
    pub(crate) fn new(seed: Option<T>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                iterations: AtomicU64::new(0),
                bridge: Mutex::new(seed),
                stats: RwLock::new(RunStats::new()),
                listeners: ListenerRegistry::new(),
                gate: PauseGate::new(),
            }),
        }
    }

    /// Number of completed iterations, counting consumed failure slots.
    pub fn iteration_count(&self) -> u64 {
        self.inner.iterations.load(Ordering::SeqCst)
    }

    /// Snapshot of the run statistics.
    pub fn stats(&self) -> RunStats {
        self.inner.stats.read().unwrap().clone()
    }

    /// Pauses the run before its next iteration.
    ///
    /// Takes effect at the next gate check; a step that is already
    /// executing finishes first. Returns `false` if already paused.
    pub fn pause(&self) -> bool {
        let changed = self.inner.gate.pause();
        if changed {
            self.inner.stats.write().unwrap().set_paused(true);
            self.emit(Event::Pause);
        }
        changed
    }

    /// Resumes a paused run. Returns `false` if not paused.
    pub fn resume(&self) -> bool {
        let changed = self.inner.gate.resume();
        if changed {
            self.inner.stats.write().unwrap().set_paused(false);
            self.emit(Event::Resume);
        }
        changed
    }

    /// Whether the run is currently paused.
    pub fn is_paused(&self) -> bool {
        self.inner.gate.is_paused()
    }

    /// Registers a listener for one event kind and returns its handle.
    ///
    /// Listeners run synchronously on the driver task, in registration
    /// order. A listener that panics aborts the run with that panic. A
    /// listener must not transitively trigger its own event kind; the
    /// callback is held locked while it runs.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&Event<T>) + Send + 'static,
    {
        self.inner.listeners.register(kind, Box::new(listener))
    }

    /// Removes a listener by handle. Returns `false` if it was not
    /// registered for that kind.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.inner.listeners.deregister(kind, id)
    }

    pub(crate) fn mark_started(&self) {
        self.inner.stats.write().unwrap().mark_started();
        self.emit(Event::Start);
    }

    pub(crate) fn mark_stopped(&self) {
        self.inner.stats.write().unwrap().mark_stopped();
        self.emit(Event::Stop);
    }

    pub(crate) fn record_error(&self, attempt: u32, message: String) {
        self.inner.stats.write().unwrap().record_error();
        self.emit(Event::error(attempt, message));
    }

    pub(crate) fn record_retry(&self, attempt: u32, delay: Duration, message: String) {
        self.inner.stats.write().unwrap().record_retry();
        self.emit(Event::retry(attempt, delay, message));
    }

    /// Advances the iteration count without success bookkeeping. Used
    /// when a final failure consumes its iteration slot.
    pub(crate) fn consume_iteration(&self) -> u64 {
        self.inner.iterations.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) async fn wait_if_paused(&self) {
        self.inner.gate.wait_ready().await;
    }

    pub(crate) fn emit(&self, event: Event<T>) {
        self.inner.listeners.emit(&event);
    }
}

impl<T: Clone> RunContext<T> {
    /// Value carried over from the most recent successful iteration, or
    /// the seed before the first one.
    pub fn bridge(&self) -> Option<T> {
        self.inner.bridge.lock().unwrap().clone()
    }

    /// Records one successful iteration and returns the new count.
    ///
    /// Order matters: the bridge and statistics update first, the
    /// iteration event fires with the new ordinal, and only then does the
    /// public count advance. The engine is the sole writer of the count.
    pub(crate) fn complete_iteration(&self, value: T, elapsed: Duration) -> u64 {
        *self.inner.bridge.lock().unwrap() = Some(value.clone());
        self.inner.stats.write().unwrap().record_execution(elapsed);

        let next = self.inner.iterations.load(Ordering::SeqCst) + 1;
        self.emit(Event::iteration(next, value));
        self.inner.iterations.store(next, Ordering::SeqCst);
        next
    }
}
