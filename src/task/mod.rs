//! Task tree core: composite nodes, progress aggregation and execution.
//!
//! A [`Task`] is a single unit of work: a human-readable description, an
//! optional one-shot action closure, and an ordered list of child tasks.
//! Leaves do the work; composite nodes group and label it. A single
//! recursive [`Task::percentage`] walk folds the whole tree into one
//! number for a progress bar, while [`Task::active_chain`] yields the
//! currently-executing path for nested displays ("[3/7] Copying files...").
//!
//! Progress is polymorphic per node and selected at construction time:
//! - composite (default) — derived from children and the running index
//! - manually watched — [`TaskWatcher`] counts reported by the action
//! - byte-stream watched — [`CountingReader`] download progress
//! - entry-count watched — archive extraction progress
//!
//! Trees are built eagerly before submission, executed exactly once on the
//! worker thread, and then become inert history. All progress fields are
//! single-writer (the executing thread) and multi-reader (UI pollers), so
//! they live in atomics and are safe to read every frame.

mod archive;
mod command;
mod download;
mod watched;


pub use download::CountingReader;
pub use watched::TaskWatcher;

use crate::error::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::debug;

use self::archive::EntryCounter;
use self::download::ByteCounter;

/// One-shot action executed by a leaf task on the worker thread.
type Action = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// How a task computes its units-done / units-total pair.
///
/// Selected once at construction; pollers never need to downcast.
pub(crate) enum ProgressKind {
    /// Derived from direct children and the running child index
    Composite,
    /// Counts reported by the action through a [`TaskWatcher`] handle
    Watched(Arc<TaskWatcher>),
    /// Bytes read through a [`CountingReader`] against a declared length
    Bytes(Arc<ByteCounter>),
    /// Archive entries extracted against the archive's entry count
    Entries(Arc<EntryCounter>),
}

/// A unit of work in the execution tree.
///
/// Tasks are shared (`Arc`) because the UI thread polls progress while the
/// worker thread executes; all mutable state is behind atomics or locks.
/// Build a tree with the fluent [`Task::add`], then hand the root to a
/// [`crate::TaskExecutor`] (or call [`Task::execute`] directly in tests).
///
/// ```
/// use frametask::Task;
///
/// let root = Task::group("Create project");
/// root.add(Task::new("Writing project file...", || Ok(())))?
///     .add(Task::new("Registering project...", || Ok(())))?;
/// # Ok::<(), frametask::Error>(())
/// ```
pub struct Task {
    /// Human-readable label, immutable after construction
    description: String,
    /// One-shot action; `None` for pure-composite group nodes
    action: Mutex<Option<Action>>,
    /// Progress strategy chosen at construction
    progress: ProgressKind,
    /// Direct children, append-only until execution starts
    children: RwLock<Vec<Arc<Task>>>,
    /// Back-reference for traversal only, never ownership
    parent: Mutex<Weak<Task>>,
    /// Index of the child currently executing; `children.len()` once done
    running_child: AtomicUsize,
    /// Set when `execute` begins; gates further mutation
    started: AtomicBool,
    start_time: Mutex<Option<Instant>>,
}

impl Task {
    pub(crate) fn build(
        description: impl Into<String>,
        action: Option<Action>,
        progress: ProgressKind,
    ) -> Arc<Task> {
        Arc::new(Task {
            description: description.into(),
            action: Mutex::new(action),
            progress,
            children: RwLock::new(Vec::new()),
            parent: Mutex::new(Weak::new()),
            running_child: AtomicUsize::new(0),
            started: AtomicBool::new(false),
            start_time: Mutex::new(None),
        })
    }

    /// Creates a leaf task that runs `action` on the worker thread.
    ///
    /// The action's error (if any) aborts the rest of the tree and is
    /// routed to the executor's error sink.
    pub fn new<F>(description: impl Into<String>, action: F) -> Arc<Task>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        Task::build(description, Some(Box::new(action)), ProgressKind::Composite)
    }

    /// Creates a pure-composite group node with no action of its own.
    pub fn group(description: impl Into<String>) -> Arc<Task> {
        Task::build(description, None, ProgressKind::Composite)
    }

    /// Appends a child task, setting its parent back-reference.
    ///
    /// Returns `self` for fluent construction:
    /// `root.add(a)?.add(b)?`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the tree this node belongs to
    /// has already started executing. That is a programming bug in the
    /// caller, not a runtime condition to recover from.
    pub fn add<'a>(self: &'a Arc<Self>, child: Arc<Task>) -> Result<&'a Arc<Self>> {
        if self.tree_started() {
            return Err(Error::InvalidState(format!(
                "cannot add \"{}\": tree of \"{}\" has already started executing",
                child.description, self.description
            )));
        }
        *child.parent.lock() = Arc::downgrade(self);
        self.children.write().push(child);
        Ok(self)
    }

    /// Executes this task and then its children, depth-first and in order.
    ///
    /// Runs the action first (if any), then each child left to right,
    /// publishing the running child index before recursing. Fail-fast: the
    /// first error aborts everything that remains in this subtree and
    /// propagates to the caller. Nothing already done is rolled back.
    pub fn execute(&self) -> Result<()> {
        self.started.store(true, Ordering::Release);
        *self.start_time.lock() = Some(Instant::now());
        debug!(task = %self.description, "task started");

        if let Some(action) = self.action.lock().take() {
            action()?;
        }

        let children = self.children();
        for (index, child) in children.iter().enumerate() {
            self.running_child.store(index, Ordering::Release);
            child.execute()?;
        }
        // One past the last child marks the subtree complete, so the
        // composite math credits every unit.
        self.running_child.store(children.len(), Ordering::Release);
        Ok(())
    }

    /// Human-readable label of this task.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Snapshot of the direct children.
    pub fn children(&self) -> Vec<Arc<Task>> {
        self.children.read().clone()
    }

    /// Parent task, if this node has been added to one.
    pub fn parent(&self) -> Option<Arc<Task>> {
        self.parent.lock().upgrade()
    }

    /// Index of the child currently executing.
    ///
    /// Only meaningful while this node is on the executing ancestor
    /// chain; equals the child count once the subtree has completed.
    pub fn running_child_index(&self) -> usize {
        self.running_child.load(Ordering::Acquire)
    }

    /// Whether execution of this node has begun.
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Total units of work for this node.
    ///
    /// Composite nodes count direct children (0 for a plain leaf);
    /// strategy nodes report their own totals (bytes, entries, watcher
    /// counts).
    pub fn units_total(&self) -> f64 {
        match &self.progress {
            ProgressKind::Composite => self.children.read().len() as f64,
            ProgressKind::Watched(watcher) => watcher.total() as f64,
            ProgressKind::Bytes(counter) => counter.length() as f64,
            ProgressKind::Entries(counter) => counter.total() as f64,
        }
    }

    /// Units of work already completed, never exceeding [`Task::units_total`]
    /// while a total is known.
    ///
    /// Composite nodes report the running child index plus fractional
    /// credit for the active child's own progress when that child has
    /// sub-units of its own.
    pub fn units_done(&self) -> f64 {
        match &self.progress {
            ProgressKind::Composite => {
                let children = self.children.read();
                if children.is_empty() {
                    return 0.0;
                }
                let index = self.running_child.load(Ordering::Acquire);
                if index >= children.len() {
                    return children.len() as f64;
                }
                let active = &children[index];
                let credit = if active.units_total() > 0.0 {
                    let p = active.percentage();
                    if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 }
                } else {
                    0.0
                };
                index as f64 + credit
            }
            ProgressKind::Watched(watcher) => watcher.done() as f64,
            ProgressKind::Bytes(counter) => counter.current() as f64,
            ProgressKind::Entries(counter) => counter.done() as f64,
        }
    }

    /// Overall progress of this subtree in `[0, 1]`.
    ///
    /// A composite node with exactly one child passes through to that
    /// child, so wrapper nodes that exist purely for labeling do not
    /// dilute the displayed progress. Division by zero is guarded: an
    /// empty composite reports `0.0`, and a byte-stream node whose source
    /// declared no content length reports `f64::NAN` — callers must treat
    /// "unknown total" as an explicit state, not render it as 0%.
    /// Polling never panics.
    pub fn percentage(&self) -> f64 {
        match &self.progress {
            ProgressKind::Composite => {
                let total = {
                    let children = self.children.read();
                    if children.len() == 1 {
                        return children[0].percentage();
                    }
                    children.len() as f64
                };
                if total == 0.0 {
                    return 0.0;
                }
                (self.units_done() / total).clamp(0.0, 1.0)
            }
            ProgressKind::Watched(watcher) => {
                let total = watcher.total();
                if total == 0 {
                    return 0.0;
                }
                (watcher.done() as f64 / total as f64).clamp(0.0, 1.0)
            }
            ProgressKind::Bytes(counter) => {
                let length = counter.length();
                if length == 0 {
                    return f64::NAN;
                }
                (counter.current() as f64 / length as f64).clamp(0.0, 1.0)
            }
            ProgressKind::Entries(counter) => {
                let total = counter.total();
                if total == 0 {
                    return 0.0;
                }
                (counter.done() as f64 / total as f64).clamp(0.0, 1.0)
            }
        }
    }

    /// Wall-clock time since this task started executing.
    ///
    /// Display only; returns zero before execution begins.
    pub fn running_for(&self) -> Duration {
        self.start_time
            .lock()
            .map(|start| start.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// The chain of currently-active nodes from this task downwards.
    ///
    /// The first element is this task itself; each following element is
    /// the running child of the previous one. Polled every frame by the
    /// progress popup.
    pub fn active_chain(&self) -> Vec<ActiveStep> {
        let mut chain = vec![self.step()];
        let mut current = self.running_child_task();
        while let Some(node) = current {
            chain.push(node.step());
            current = node.running_child_task();
        }
        chain
    }

    fn running_child_task(&self) -> Option<Arc<Task>> {
        let children = self.children.read();
        children
            .get(self.running_child.load(Ordering::Acquire))
            .cloned()
    }

    fn step(&self) -> ActiveStep {
        ActiveStep {
            description: self.description.clone(),
            units_done: self.units_done(),
            units_total: self.units_total(),
        }
    }

    /// True once the whole tree containing this node has begun executing.
    fn tree_started(&self) -> bool {
        if self.started.load(Ordering::Acquire) {
            return true;
        }
        let mut node = self.parent();
        while let Some(parent) = node {
            if parent.started.load(Ordering::Acquire) {
                return true;
            }
            node = parent.parent();
        }
        false
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("description", &self.description)
            .field("children", &self.children.read().len())
            .field("running_child", &self.running_child.load(Ordering::Relaxed))
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish()
    }
}

/// One node of the currently-active execution chain, for nested displays.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveStep {
    /// Label of the node
    pub description: String,
    /// Units completed at the moment of the poll
    pub units_done: f64,
    /// Total units, 0 when unknown or leaf
    pub units_total: f64,
}

impl fmt::Display for ActiveStep {
    /// Renders as `[done/total] description`, e.g. `[3/7] Copying files...`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.units_total > 0.0 {
            write!(
                f,
                "[{}/{}] {}",
                self.units_done.floor() as u64,
                self.units_total as u64,
                self.description
            )
        } else {
            write!(f, "{}", self.description)
        }
    }
}
