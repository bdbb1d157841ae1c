//! Cooperative pause gate.
//!
//! The engine checks the gate between iterations and parks until resumed.
//! Pausing never interrupts a step that is already executing.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared pause flag with async wait support.
///
/// Clones share state. `true` in the channel means paused.
#[derive(Debug, Clone)]
pub(crate) struct PauseGate {
    tx: Arc<watch::Sender<bool>>,
}

impl PauseGate {
    /// Creates a gate in the ready (not paused) state.
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Pauses the gate. Returns `false` if it was already paused.
    pub(crate) fn pause(&self) -> bool {
        self.tx.send_if_modified(|paused| {
            if *paused {
                false
            } else {
                *paused = true;
                true
            }
        })
    }

    /// Resumes the gate. Returns `false` if it was not paused.
    pub(crate) fn resume(&self) -> bool {
        self.tx.send_if_modified(|paused| {
            if *paused {
                *paused = false;
                true
            } else {
                false
            }
        })
    }

    /// Whether the gate is currently paused.
    pub(crate) fn is_paused(&self) -> bool {
        *self.tx.borrow()
    }

    /// Waits until the gate is not paused. Returns immediately when ready.
    pub(crate) async fn wait_ready(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we
        // wait.
        let _ = rx.wait_for(|paused| !*paused).await;
    }
}
