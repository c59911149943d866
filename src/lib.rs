//! # frametask
//!
//! Hierarchical background task engine for frame-loop (UI/render)
//! applications.
//!
//! ## Design Philosophy
//!
//! frametask is designed to be:
//! - **Library-first** - No UI or rendering, purely a Rust crate for embedding
//! - **Poll-friendly** - Progress is read with cheap atomic loads, safe every frame
//! - **Strictly serialized** - One tree at a time on one dedicated worker thread
//! - **Fail-fast** - The first leaf failure aborts the tree and lands in the error sink
//!
//! ## Quick Start
//!
//! ```no_run
//! use frametask::{DispatchQueue, Task, TaskExecutor, TaskGroup, TaskTree};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), frametask::Error> {
//!     let executor = TaskExecutor::new()?;
//!     let ui_queue = Arc::new(DispatchQueue::new());
//!
//!     // Build a tree of long-running work off the UI thread.
//!     let queue = Arc::clone(&ui_queue);
//!     let tree = TaskTree::new(TaskGroup::ProjectManager, "Create project");
//!     tree.add(Task::new("Writing project files...", move || {
//!         // ... write files, then ask the UI thread to refresh:
//!         queue.enqueue(|| { /* touch UI state here */ });
//!         Ok(())
//!     }))?;
//!     executor.submit(tree)?;
//!
//!     // Render loop, one iteration per frame:
//!     loop {
//!         if let Some(tree) = executor.current_tree() {
//!             for step in tree.active_chain() {
//!                 println!("{step}");
//!             }
//!         }
//!         ui_queue.drain_and_run();
//!         # break;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// UI-thread dispatch queue
pub mod dispatch;
/// Error types
pub mod error;
/// Serializing task executor and error sink
pub mod executor;
/// Task nodes and progress strategies
pub mod task;
/// Task tree roots and display groups
pub mod tree;

// Re-export commonly used types
pub use dispatch::DispatchQueue;
pub use error::{Error, ExtractError, Result};
pub use executor::{ErrorSink, TaskExecutor};
pub use task::{ActiveStep, CountingReader, Task, TaskWatcher};
pub use tree::{TaskGroup, TaskTree};
