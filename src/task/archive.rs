//! Entry-count-watched progress: zip archive extraction leaf.
//!
//! Extraction is best-effort and non-transactional: a failing entry
//! aborts the task, but entries already written stay on disk.

use super::{ProgressKind, Task};
use crate::error::{Error, ExtractError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Shared entry counter behind an extraction task's progress.
///
/// The total is fixed from the archive's entry count before the first
/// entry is written, so pollers never see a moving target.
#[derive(Debug, Default)]
pub(crate) struct EntryCounter {
    total: AtomicU64,
    done: AtomicU64,
}

impl EntryCounter {
    pub(crate) fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Release);
    }

    pub(crate) fn set_done(&self, done: u64) {
        self.done.store(done, Ordering::Release);
    }

    /// Entry count of the archive, 0 until it has been opened.
    pub(crate) fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Fully-extracted entries, clamped to the total.
    pub(crate) fn done(&self) -> u64 {
        let total = self.total.load(Ordering::Acquire);
        self.done.load(Ordering::Acquire).min(total)
    }
}

impl Task {
    /// Creates an extraction leaf that unpacks the zip at `archive` into
    /// `dest`, reporting per-entry progress.
    ///
    /// Entries with unsafe paths (escaping `dest`) are skipped with a
    /// warning, matching the treatment of untrusted archives elsewhere.
    pub fn extract_zip(
        description: impl Into<String>,
        archive: impl Into<PathBuf>,
        dest: impl Into<PathBuf>,
    ) -> Arc<Task> {
        let archive = archive.into();
        let dest = dest.into();
        let counter = Arc::new(EntryCounter::default());
        let shared = Arc::clone(&counter);

        let action = move || extract_zip_archive(&archive, &dest, &shared);
        Task::build(
            description,
            Some(Box::new(action)),
            ProgressKind::Entries(counter),
        )
    }
}

fn entry_failed(archive: &Path, index: usize, reason: String) -> Error {
    Error::Extract(ExtractError::EntryFailed {
        archive: archive.to_path_buf(),
        index,
        reason,
    })
}

/// Extracts every entry of `archive_path` into `dest`, updating `progress`
/// after each completed entry.
fn extract_zip_archive(archive_path: &Path, dest: &Path, progress: &EntryCounter) -> Result<()> {
    let file = std::fs::File::open(archive_path).map_err(|e| {
        Error::Extract(ExtractError::OpenFailed {
            archive: archive_path.to_path_buf(),
            reason: format!("failed to open file: {}", e),
        })
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| {
        Error::Extract(ExtractError::OpenFailed {
            archive: archive_path.to_path_buf(),
            reason: format!("not a readable zip archive: {}", e),
        })
    })?;

    let entry_count = archive.len();
    progress.set_total(entry_count as u64);
    debug!(
        archive = %archive_path.display(),
        entries = entry_count,
        "extracting zip archive"
    );

    for index in 0..entry_count {
        let mut entry = archive.by_index(index).map_err(|e| {
            entry_failed(archive_path, index, format!("failed to read entry: {}", e))
        })?;

        let target = match entry.enclosed_name() {
            Some(path) => dest.join(path),
            None => {
                warn!(index, name = entry.name(), "skipping entry with unsafe path");
                progress.set_done((index + 1) as u64);
                continue;
            }
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| {
                entry_failed(
                    archive_path,
                    index,
                    format!("failed to create directory: {}", e),
                )
            })?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    entry_failed(
                        archive_path,
                        index,
                        format!("failed to create parent directory: {}", e),
                    )
                })?;
            }
            let mut out = std::fs::File::create(&target).map_err(|e| {
                entry_failed(archive_path, index, format!("failed to create file: {}", e))
            })?;
            std::io::copy(&mut entry, &mut out).map_err(|e| {
                entry_failed(archive_path, index, format!("failed to write file: {}", e))
            })?;
        }

        progress.set_done((index + 1) as u64);
    }

    debug!(archive = %archive_path.display(), "extraction complete");
    Ok(())
}
