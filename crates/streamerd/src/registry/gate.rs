//! Quiescence barrier between fan-out calls and shutdown.
//!
//! Every fan-out call holds a [`GatePass`] from the moment it observes the
//! streamer running until its last enqueue has finished. `stop` flips the
//! running flag first and then waits here for the count to reach zero, so
//! no enqueue can overlap with outboxes being closed.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Counts in-flight fan-out operations.
#[derive(Debug, Default)]
pub(crate) struct InFlightGate {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlightGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers one in-flight operation until the pass is dropped.
    pub(crate) fn enter(&self) -> GatePass<'_> {
        self.count.fetch_add(1, Ordering::SeqCst);
        GatePass { gate: self }
    }

    /// Number of operations currently in flight.
    pub(crate) fn in_flight(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Waits until no operation is in flight.
    pub(crate) async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register for wakeups before checking, or a pass dropped in
            // between would be missed.
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Proof of one in-flight operation.
#[derive(Debug)]
pub(crate) struct GatePass<'a> {
    gate: &'a InFlightGate,
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        if self.gate.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.gate.idle.notify_waiters();
        }
    }
}
