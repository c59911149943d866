//! Single-consumer dispatch queue for UI-thread work.
//!
//! Background work (typically a leaf action on the executor's worker
//! thread) must not touch state owned by the UI/render thread — graphics
//! contexts, popups, window state. Instead it enqueues a closure here and
//! the render loop drains the queue exactly once per frame.

use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use tracing::error;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Queue of pending closures awaiting execution on the UI thread.
///
/// Producers on any thread call [`DispatchQueue::enqueue`]; the single
/// consumer (the render loop) calls [`DispatchQueue::drain_and_run`] once
/// per frame. Every enqueued closure runs exactly once, in FIFO order per
/// producer. There is no priority and no cancellation.
#[derive(Default)]
pub struct DispatchQueue {
    pending: Mutex<Vec<Job>>,
}

impl DispatchQueue {
    /// Creates an empty queue.
    pub fn new() -> DispatchQueue {
        DispatchQueue::default()
    }

    /// Appends a closure to run on the next drain. Callable from any
    /// thread.
    pub fn enqueue(&self, job: impl FnOnce() + Send + 'static) {
        self.pending.lock().push(Box::new(job));
    }

    /// Swaps out the pending closures and runs them in FIFO order.
    ///
    /// Must be called on the UI thread, once per loop iteration. The
    /// closures run outside the lock, so a closure enqueuing further work
    /// neither deadlocks nor gets executed in this pass — it is picked up
    /// next frame.
    ///
    /// A panicking closure is logged and isolated; the remaining closures
    /// in the batch still run. Returns the number of closures executed.
    pub fn drain_and_run(&self) -> usize {
        let jobs = std::mem::take(&mut *self.pending.lock());
        let count = jobs.len();
        for job in jobs {
            if std::panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!("dispatched closure panicked; continuing with the rest of the batch");
            }
        }
        count
    }

    /// Number of closures currently waiting.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether no closures are waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
