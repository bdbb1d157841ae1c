//! Per-run listener registry.
//!
//! One registry is owned by each run context and discarded with it; there
//! is no process-wide listener state. Emission walks a snapshot of the
//! registration set taken at emission time, so listeners registered or
//! removed during a pass do not affect that pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::{Event, EventKind};

/// Handle identifying one listener registration.
///
/// Returned by `RunContext::on` and consumed by `RunContext::off`. Closures
/// are not identity-comparable, so removal goes through this id instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<T> = Box<dyn FnMut(&Event<T>) + Send>;

/// Registry mapping event kinds to their registered listeners.
pub(crate) struct ListenerRegistry<T> {
    listeners: Mutex<HashMap<EventKind, Vec<(ListenerId, Arc<Mutex<Callback<T>>>)>>>,
    next_id: AtomicU64,
}

impl<T> ListenerRegistry<T> {
    /// Creates an empty registry.
    pub(crate) fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a listener for one event kind and returns its handle.
    pub(crate) fn register<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&Event<T>) + Send + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let callback: Callback<T> = Box::new(listener);

        let mut listeners = self.listeners.lock().unwrap();
        listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(Mutex::new(callback))));

        id
    }

    /// Removes a listener registration.
    ///
    /// Returns true if the id was registered for the given kind. An
    /// emission pass already in progress still invokes the removed
    /// listener once.
    pub(crate) fn deregister(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap();
        match listeners.get_mut(&kind) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|(entry_id, _)| *entry_id != id);
                entries.len() != before
            }
            None => false,
        }
    }

    /// Invokes all listeners currently registered for the event's kind.
    ///
    /// The registry lock is released before any listener runs, so listeners
    /// may register and deregister freely; such changes take effect from
    /// the next emission.
    pub(crate) fn emit(&self, event: &Event<T>) {
        let snapshot: Vec<Arc<Mutex<Callback<T>>>> = {
            let listeners = self.listeners.lock().unwrap();
            match listeners.get(&event.kind()) {
                Some(entries) => entries.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return,
            }
        };

        for callback in snapshot {
            let mut callback = callback.lock().unwrap();
            (callback)(event);
        }
    }

    /// Returns the number of listeners registered for one kind.
    #[cfg(test)]
    fn count(&self, kind: EventKind) -> usize {
        let listeners = self.listeners.lock().unwrap();
        listeners.get(&kind).map_or(0, |entries| entries.len())
    }
}
