//! Error types for frametask
//!
//! This module provides the error handling surface for the engine:
//! - Lifecycle errors (mutating a started tree, double submission)
//! - Leaf action failures (I/O, network, extraction, external tools)
//! - A nested domain enum for archive extraction failures
//!
//! Task-execution errors never cross to the UI thread as panics or
//! exceptions; the executor forwards them to an [`crate::ErrorSink`] and
//! the polling layer reads them as data.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for frametask operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for frametask
///
/// Leaf actions return this from their closures; the executor captures it
/// and routes it to the error sink. Construction and submission errors are
/// surfaced synchronously to the caller instead.
#[derive(Debug, Error)]
pub enum Error {
    /// A task tree was mutated after its execution had already started
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A task tree was submitted while another one was still running
    #[error("executor busy: a task tree is already running")]
    ExecutorBusy,

    /// The executor has been shut down and no longer accepts task trees
    #[error("executor shut down: not accepting task trees")]
    ShutDown,

    /// I/O error from a leaf action
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error from the download leaf
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A download leaf was given a malformed URL
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Archive extraction failed
    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// An external process exited unsuccessfully or could not be spawned
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// A task action panicked on the worker thread
    #[error("task panicked: {0}")]
    Panicked(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Archive-extraction errors for the entry-count-watched leaf
///
/// Extraction is best-effort and non-transactional: entries written before
/// the failing one stay on disk.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The archive could not be opened or read as a zip file
    #[error("failed to open archive {}: {reason}", archive.display())]
    OpenFailed {
        /// Path of the archive that could not be opened
        archive: PathBuf,
        /// Underlying failure description
        reason: String,
    },

    /// A single entry could not be read or written to disk
    #[error("failed to extract entry {index} from {}: {reason}", archive.display())]
    EntryFailed {
        /// Path of the archive being extracted
        archive: PathBuf,
        /// Zero-based index of the failing entry
        index: usize,
        /// Underlying failure description
        reason: String,
    },
}
