//! Task tree roots: named, grouped aggregates of tasks.

use crate::error::Result;
use crate::task::{ActiveStep, Task};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Coarse categorization of a task tree, used only for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskGroup {
    /// Project lifecycle operations (create, open, register)
    ProjectManager,
    /// Editor-level operations (settings, registration, tooling)
    Editor,
}

impl TaskGroup {
    /// Display name shown in the progress popup.
    pub fn name(&self) -> &'static str {
        match self {
            TaskGroup::ProjectManager => "Project manager",
            TaskGroup::Editor => "Editor",
        }
    }
}

impl fmt::Display for TaskGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named root task representing one submitted logical operation
/// (e.g. "Create project").
///
/// The root is just a [`Task`] with no parent plus a [`TaskGroup`]; all
/// progress semantics are the recursive ones of the underlying task. Poll
/// methods are delegated so the UI layer can render a popup from the tree
/// handle returned by [`crate::TaskExecutor::current_tree`].
#[derive(Debug)]
pub struct TaskTree {
    group: TaskGroup,
    root: Arc<Task>,
}

impl TaskTree {
    /// Creates a tree with an empty composite root node.
    pub fn new(group: TaskGroup, description: impl Into<String>) -> TaskTree {
        TaskTree {
            group,
            root: Task::group(description),
        }
    }

    /// Creates a tree around an existing root task.
    pub fn with_root(group: TaskGroup, root: Arc<Task>) -> TaskTree {
        TaskTree { group, root }
    }

    /// Appends a child to the root; fluent like [`Task::add`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidState`] once execution has started.
    pub fn add(&self, child: Arc<Task>) -> Result<&TaskTree> {
        self.root.add(child)?;
        Ok(self)
    }

    /// The tree's display group.
    pub fn group(&self) -> TaskGroup {
        self.group
    }

    /// The root task.
    pub fn task(&self) -> &Arc<Task> {
        &self.root
    }

    /// Label of the root node.
    pub fn description(&self) -> &str {
        self.root.description()
    }

    /// Recursive progress of the whole tree in `[0, 1]`.
    pub fn percentage(&self) -> f64 {
        self.root.percentage()
    }

    /// Wall-clock time since the tree started executing.
    pub fn running_for(&self) -> Duration {
        self.root.running_for()
    }

    /// Currently-active node chain for the nested progress display.
    pub fn active_chain(&self) -> Vec<ActiveStep> {
        self.root.active_chain()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_display_names() {
        assert_eq!(TaskGroup::ProjectManager.to_string(), "Project manager");
        assert_eq!(TaskGroup::Editor.name(), "Editor");
    }

    #[test]
    fn test_tree_delegates_to_root() {
        let tree = TaskTree::new(TaskGroup::ProjectManager, "Create project");
        tree.add(Task::new("write", || Ok(())))
            .unwrap()
            .add(Task::new("register", || Ok(())))
            .unwrap();

        assert_eq!(tree.description(), "Create project");
        assert_eq!(tree.group(), TaskGroup::ProjectManager);
        assert_eq!(tree.percentage(), 0.0);

        tree.task().execute().unwrap();
        assert_eq!(tree.percentage(), 1.0);
        assert!(tree.task().has_started());
    }

    #[test]
    fn test_tree_with_existing_root() {
        let root = Task::group("Install");
        root.add(Task::group("step")).unwrap();
        let tree = TaskTree::with_root(TaskGroup::Editor, root);
        assert_eq!(tree.description(), "Install");
        assert_eq!(tree.active_chain().len(), 2);
    }
}
