//! Byte-stream-watched progress: download tasks and the counting reader.

use super::{ProgressKind, Task};
use crate::error::Result;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// User agent sent by the download leaf.
const USER_AGENT: &str = concat!("frametask/", env!("CARGO_PKG_VERSION"));

/// Shared byte counter behind a download task's progress.
///
/// Single writer (the worker thread reading the stream), many readers
/// (UI pollers). A length of 0 means "unknown".
#[derive(Debug, Default)]
pub(crate) struct ByteCounter {
    length: AtomicU64,
    current: AtomicU64,
}

impl ByteCounter {
    pub(crate) fn set_length(&self, length: u64) {
        self.length.store(length, Ordering::Release);
    }

    pub(crate) fn add(&self, bytes: u64) {
        self.current.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Declared total length in bytes, 0 when the source did not provide one.
    pub(crate) fn length(&self) -> u64 {
        self.length.load(Ordering::Acquire)
    }

    /// Bytes read so far, clamped to the declared length when one is known.
    pub(crate) fn current(&self) -> u64 {
        let current = self.current.load(Ordering::Acquire);
        let length = self.length.load(Ordering::Acquire);
        if length > 0 { current.min(length) } else { current }
    }
}

/// A [`Read`] wrapper that counts every byte passing through it.
///
/// The download leaf hands one of these to the consuming closure; the
/// closure streams it wherever it wants (a file, a parser) and the task's
/// progress follows automatically. Also usable standalone over any reader:
///
/// ```
/// use frametask::CountingReader;
/// use std::io::Read;
///
/// let mut reader = CountingReader::new(&b"hello"[..], Some(5));
/// let mut out = Vec::new();
/// reader.read_to_end(&mut out).unwrap();
/// assert_eq!(reader.bytes_read(), 5);
/// ```
pub struct CountingReader<R> {
    inner: R,
    counter: Arc<ByteCounter>,
}

impl<R: Read> CountingReader<R> {
    /// Wraps `inner`, tracking progress against `declared_length` bytes.
    ///
    /// Pass `None` when the total size is unknown; the owning task's
    /// `percentage()` then reports `f64::NAN` instead of a bogus ratio.
    pub fn new(inner: R, declared_length: Option<u64>) -> Self {
        let counter = Arc::new(ByteCounter::default());
        if let Some(length) = declared_length {
            counter.set_length(length);
        }
        CountingReader { inner, counter }
    }

    pub(crate) fn with_counter(inner: R, counter: Arc<ByteCounter>) -> Self {
        CountingReader { inner, counter }
    }

    /// Bytes read through this wrapper so far.
    pub fn bytes_read(&self) -> u64 {
        self.counter.current()
    }

    /// Declared total length, if the source provided one.
    pub fn declared_length(&self) -> Option<u64> {
        match self.counter.length() {
            0 => None,
            length => Some(length),
        }
    }

    /// Unwraps the counting layer, returning the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.counter.add(read as u64);
        Ok(read)
    }
}

impl Task {
    /// Creates a download leaf: a blocking HTTP GET whose body is handed
    /// to `consume` as a [`CountingReader`].
    ///
    /// The task's progress is bytes-received against the response's
    /// `Content-Length`. When the server declares no length the total
    /// stays unknown and `percentage()` reports `f64::NAN`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidUrl`] if `url` does not parse.
    /// Connection and HTTP-status failures surface later, when the task
    /// executes on the worker thread.
    pub fn download<F>(url: &str, consume: F) -> Result<Arc<Task>>
    where
        F: FnOnce(&mut CountingReader<reqwest::blocking::Response>) -> Result<()>
            + Send
            + 'static,
    {
        let parsed = url::Url::parse(url)?;
        let counter = Arc::new(ByteCounter::default());
        let shared = Arc::clone(&counter);
        let description = format!("Downloading {parsed}...");

        let action = move || {
            debug!(url = %parsed, "starting download");
            let client = reqwest::blocking::Client::builder()
                .user_agent(USER_AGENT)
                .build()?;
            let response = client.get(parsed.clone()).send()?.error_for_status()?;
            match response.content_length() {
                Some(length) => shared.set_length(length),
                None => warn!(url = %parsed, "server declared no content length"),
            }
            let mut reader = CountingReader::with_counter(response, shared);
            consume(&mut reader)
        };

        Ok(Task::build(
            description,
            Some(Box::new(action)),
            ProgressKind::Bytes(counter),
        ))
    }

    /// Creates a download leaf that streams the response body to `dest`,
    /// creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidUrl`] if `url` does not parse.
    pub fn download_to_file(url: &str, dest: impl Into<PathBuf>) -> Result<Arc<Task>> {
        let dest = dest.into();
        Self::download(url, move |reader| {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = std::fs::File::create(&dest)?;
            let written = std::io::copy(reader, &mut file)?;
            debug!(dest = %dest.display(), written, "download written to file");
            Ok(())
        })
    }
}
