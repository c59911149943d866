//! Manually-watched progress: the action reports its own counts.

use super::{ProgressKind, Task};
use crate::error::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Progress handle passed into a watched task's action.
///
/// The action calls [`TaskWatcher::set_total`] once (typically after
/// discovering how many items it has to process) and then reports
/// completed counts as it goes, either absolutely with
/// [`TaskWatcher::set_done`] or incrementally with [`TaskWatcher::advance`].
/// Reads clamp done to the reported total, so pollers never observe
/// done > total.
#[derive(Debug, Default)]
pub struct TaskWatcher {
    total: AtomicU64,
    done: AtomicU64,
}

impl TaskWatcher {
    /// Reports the total number of units this task will process.
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Release);
    }

    /// Reports the absolute number of units completed so far.
    pub fn set_done(&self, done: u64) {
        self.done.store(done, Ordering::Release);
    }

    /// Adds `delta` completed units to the current count.
    pub fn advance(&self, delta: u64) {
        self.done.fetch_add(delta, Ordering::AcqRel);
    }

    /// Last-reported total, 0 until the action reports one.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Completed units, clamped to the reported total.
    pub fn done(&self) -> u64 {
        let total = self.total.load(Ordering::Acquire);
        self.done.load(Ordering::Acquire).min(total)
    }
}

impl Task {
    /// Creates a leaf whose progress is reported by the action itself.
    ///
    /// Used when the unit of progress is domain-specific, e.g. a file
    /// count:
    ///
    /// ```
    /// use frametask::Task;
    ///
    /// let files = vec!["a.txt", "b.txt", "c.txt"];
    /// let task = Task::watched("Copying files...", move |watcher| {
    ///     watcher.set_total(files.len() as u64);
    ///     for (i, _file) in files.iter().enumerate() {
    ///         // copy the file ...
    ///         watcher.set_done(i as u64 + 1);
    ///     }
    ///     Ok(())
    /// });
    /// ```
    pub fn watched<F>(description: impl Into<String>, action: F) -> Arc<Task>
    where
        F: FnOnce(&TaskWatcher) -> Result<()> + Send + 'static,
    {
        let watcher = Arc::new(TaskWatcher::default());
        let handle = Arc::clone(&watcher);
        Task::build(
            description,
            Some(Box::new(move || action(&handle))),
            ProgressKind::Watched(watcher),
        )
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watcher_defaults_to_zero() {
        let watcher = TaskWatcher::default();
        assert_eq!(watcher.total(), 0);
        assert_eq!(watcher.done(), 0);
    }

    #[test]
    fn test_watcher_done_clamped_to_total() {
        let watcher = TaskWatcher::default();
        watcher.set_total(5);
        watcher.set_done(9);
        assert_eq!(
            watcher.done(),
            5,
            "done must never exceed the reported total"
        );
    }

    #[test]
    fn test_watcher_advance_accumulates() {
        let watcher = TaskWatcher::default();
        watcher.set_total(10);
        watcher.advance(3);
        watcher.advance(4);
        assert_eq!(watcher.done(), 7);
    }

    #[test]
    fn test_watched_task_action_receives_handle() {
        let task = Task::watched("Counting...", |watcher| {
            watcher.set_total(4);
            watcher.set_done(4);
            Ok(())
        });

        assert_eq!(task.units_total(), 0.0, "no counts before execution");
        task.execute().unwrap();
        assert_eq!(task.units_total(), 4.0);
        assert_eq!(task.units_done(), 4.0);
        assert_eq!(task.percentage(), 1.0);
    }

    #[test]
    fn test_watched_task_percentage_monotonic() {
        let watcher = TaskWatcher::default();
        watcher.set_total(8);

        let mut last = 0.0_f64;
        for done in 0..=8 {
            watcher.set_done(done);
            let p = watcher.done() as f64 / watcher.total() as f64;
            assert!(
                p >= last,
                "percentage regressed from {} to {} at done={}",
                last,
                p,
                done
            );
            last = p;
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_watched_task_error_propagates() {
        let task = Task::watched("Failing...", |watcher| {
            watcher.set_total(2);
            Err(crate::Error::Other("walk failed".to_string()))
        });

        let result = task.execute();
        assert!(result.is_err(), "action error should propagate");
    }
}
