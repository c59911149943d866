//! Serializing task executor and the error sink it reports to.
//!
//! The executor owns one dedicated worker thread. Task trees run on it
//! strictly one after another, never interleaved, because leaf actions are
//! not required to be reentrant or thread-safe relative to each other. The
//! worker may block for arbitrarily long (network, external processes) —
//! that is the point of keeping it off the UI thread.
//!
//! Submission is single-slot: submitting while a tree is running is a
//! programming error surfaced synchronously as [`Error::ExecutorBusy`],
//! never silently queued. The UI thread polls
//! [`TaskExecutor::current_tree`] every frame to decide whether to render
//! a progress popup; failures only ever reach it as entries in the
//! [`ErrorSink`].
//!
//! There is no global "current executor": construct one at startup and
//! pass the handle to every component that submits or polls.

use crate::error::{Error, Result};
use crate::tree::TaskTree;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

type FailureNotifier = Box<dyn Fn(&Error) + Send + Sync>;

/// Ordered, appendable/removable list of reported task failures.
///
/// The executor appends here when a tree fails; the consuming layer reads
/// the entries for display (error popup) and removes them as the user
/// dismisses them. An optional notifier fires on every report so the
/// application can react immediately — typically by enqueuing a
/// popup-open on the [`crate::DispatchQueue`].
#[derive(Default)]
pub struct ErrorSink {
    entries: Mutex<Vec<Error>>,
    notifier: Mutex<Option<FailureNotifier>>,
}

impl ErrorSink {
    /// Creates an empty sink with no notifier.
    pub fn new() -> ErrorSink {
        ErrorSink::default()
    }

    /// Installs the callback invoked on every reported failure.
    ///
    /// The callback runs on the worker thread; keep it cheap and route
    /// UI work through the dispatch queue.
    pub fn set_notifier(&self, notifier: impl Fn(&Error) + Send + Sync + 'static) {
        *self.notifier.lock() = Some(Box::new(notifier));
    }

    /// Appends a failure and fires the notifier.
    pub fn report(&self, err: Error) {
        error!(%err, "task failure reported");
        if let Some(notifier) = self.notifier.lock().as_ref() {
            notifier(&err);
        }
        self.entries.lock().push(err);
    }

    /// Number of failures currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the sink holds no failures.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Removes and returns the failure at `index`, or `None` if out of
    /// range. Remaining entries keep their order.
    pub fn dismiss(&self, index: usize) -> Option<Error> {
        let mut entries = self.entries.lock();
        if index < entries.len() {
            Some(entries.remove(index))
        } else {
            None
        }
    }

    /// Display strings of all held failures, in report order.
    pub fn messages(&self) -> Vec<String> {
        self.entries.lock().iter().map(Error::to_string).collect()
    }
}

/// Shared state between executor handle and worker thread.
struct Shared {
    /// Tree currently executing, cleared when the worker goes idle
    current: Mutex<Option<Arc<TaskTree>>>,
    /// Single-slot occupancy flag; set by submit, cleared by the worker
    busy: AtomicBool,
    errors: Arc<ErrorSink>,
}

/// Accepts task trees and runs them, one at a time, on a dedicated worker
/// thread.
///
/// ```no_run
/// use frametask::{Task, TaskExecutor, TaskGroup, TaskTree};
///
/// let executor = TaskExecutor::new()?;
///
/// let tree = TaskTree::new(TaskGroup::ProjectManager, "Create project");
/// tree.add(Task::new("Writing project files...", || Ok(())))?;
/// executor.submit(tree)?;
///
/// // Per frame, on the UI thread:
/// if let Some(tree) = executor.current_tree() {
///     println!("{} — {:.0}%", tree.description(), tree.percentage() * 100.0);
/// }
/// # Ok::<(), frametask::Error>(())
/// ```
pub struct TaskExecutor {
    shared: Arc<Shared>,
    sender: Mutex<Option<mpsc::Sender<Arc<TaskTree>>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl TaskExecutor {
    /// Creates an executor with its own fresh [`ErrorSink`].
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn new() -> Result<TaskExecutor> {
        TaskExecutor::with_error_sink(Arc::new(ErrorSink::new()))
    }

    /// Creates an executor reporting to an existing sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn with_error_sink(errors: Arc<ErrorSink>) -> Result<TaskExecutor> {
        let (sender, receiver) = mpsc::channel();
        let shared = Arc::new(Shared {
            current: Mutex::new(None),
            busy: AtomicBool::new(false),
            errors,
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("frametask-worker".to_string())
            .spawn(move || worker_loop(receiver, worker_shared))?;

        Ok(TaskExecutor {
            shared,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Submits a task tree for execution.
    ///
    /// Returns a handle to the (now executing) tree; the same handle is
    /// observable through [`TaskExecutor::current_tree`] until the tree
    /// finishes.
    ///
    /// # Errors
    ///
    /// - [`Error::ExecutorBusy`] if a tree is already running. Nothing is
    ///   queued; callers must not submit concurrently.
    /// - [`Error::ShutDown`] if the executor has been shut down.
    pub fn submit(&self, tree: TaskTree) -> Result<Arc<TaskTree>> {
        if self.shared.busy.swap(true, Ordering::AcqRel) {
            return Err(Error::ExecutorBusy);
        }

        let tree = Arc::new(tree);
        *self.shared.current.lock() = Some(Arc::clone(&tree));

        let sent = self
            .sender
            .lock()
            .as_ref()
            .is_some_and(|sender| sender.send(Arc::clone(&tree)).is_ok());
        if !sent {
            *self.shared.current.lock() = None;
            self.shared.busy.store(false, Ordering::Release);
            return Err(Error::ShutDown);
        }

        info!(group = %tree.group(), tree = %tree.description(), "task tree submitted");
        Ok(tree)
    }

    /// The tree currently executing, if any.
    ///
    /// Non-blocking; safe to call from the UI thread every frame while
    /// the worker mutates progress fields.
    pub fn current_tree(&self) -> Option<Arc<TaskTree>> {
        self.shared.current.lock().clone()
    }

    /// Whether a tree is currently running.
    pub fn is_running(&self) -> bool {
        self.shared.busy.load(Ordering::Acquire)
    }

    /// The sink receiving this executor's failures.
    pub fn error_sink(&self) -> &Arc<ErrorSink> {
        &self.shared.errors
    }

    /// Stops accepting trees and joins the worker thread.
    ///
    /// The currently-running tree (if any) finishes first. Called
    /// automatically on drop.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().take();
        drop(sender);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!("task worker thread panicked during shutdown");
            }
        }
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs submitted trees until the channel closes.
fn worker_loop(receiver: mpsc::Receiver<Arc<TaskTree>>, shared: Arc<Shared>) {
    while let Ok(tree) = receiver.recv() {
        let started = Instant::now();
        info!(group = %tree.group(), tree = %tree.description(), "task tree started");

        // A panicking action must not take the worker thread down with it.
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| tree.task().execute()));
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => Err(Error::Panicked(panic_message(panic))),
        };

        match result {
            Ok(()) => info!(
                tree = %tree.description(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "task tree completed"
            ),
            Err(err) => {
                warn!(tree = %tree.description(), %err, "task tree failed");
                shared.errors.report(err);
            }
        }

        *shared.current.lock() = None;
        shared.busy.store(false, Ordering::Release);
    }
    debug!("task worker shutting down");
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
