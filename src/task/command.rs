//! External-process leaf: spawn a command and wait for it.

use super::Task;
use crate::error::Error;
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

impl Task {
    /// Creates a leaf that runs `command` to completion on the worker
    /// thread.
    ///
    /// The process inherits stdio; a spawn failure or a non-zero exit
    /// status fails the task. There is no progress contract for external
    /// tools, so the node reports like any plain leaf.
    pub fn command(description: impl Into<String>, mut command: Command) -> Arc<Task> {
        let program = command.get_program().to_string_lossy().into_owned();
        Task::new(description, move || {
            debug!(program = %program, "running external tool");
            let status = command.status().map_err(|e| {
                Error::ExternalTool(format!("failed to spawn {}: {}", program, e))
            })?;
            if status.success() {
                Ok(())
            } else {
                Err(Error::ExternalTool(format!(
                    "{} exited with {}",
                    program, status
                )))
            }
        })
    }
}
