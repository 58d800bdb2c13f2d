//! Abstractions for filesystem access to enable testing and mocking.
//!
//! The `FileSystem` trait allows the collector to work with both the real
//! `/proc` filesystem on Linux and mock implementations for testing.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

/// Abstraction for filesystem operations.
///
/// This trait allows collectors to read from the real filesystem or from
/// a mock implementation for testing purposes.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Lists entries in a directory.
    ///
    /// # Returns
    /// A vector of paths to entries in the directory, or an I/O error.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Real filesystem implementation that delegates to `std::fs`.
///
/// Use this in production to read from the actual `/proc` filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs {
    read_timeout: Option<Duration>,
}

impl RealFs {
    /// Creates a new `RealFs` instance with unbounded reads.
    pub fn new() -> Self {
        Self { read_timeout: None }
    }

    /// Bounds every `read_to_string` call.
    ///
    /// Reads that exceed the timeout fail with `ErrorKind::TimedOut`. The
    /// blocked reader thread is detached and finishes on its own; at most 64
    /// such threads exist at once.
    pub fn with_read_timeout(timeout: Duration) -> Self {
        Self {
            read_timeout: Some(timeout),
        }
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }
}

/// Reader threads that may still be running, including ones whose read
/// timed out and was abandoned.
static READER_SLOTS: ReadSlots = ReadSlots::new(64);

/// Counts reader threads against a fixed ceiling.
struct ReadSlots {
    pending: AtomicUsize,
    limit: usize,
}

/// Held by a reader thread until it exits.
struct ReadSlot(&'static ReadSlots);

impl ReadSlots {
    const fn new(limit: usize) -> Self {
        Self {
            pending: AtomicUsize::new(0),
            limit,
        }
    }

    fn acquire(&'static self) -> Option<ReadSlot> {
        self.pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .ok()
            .map(|_| ReadSlot(self))
    }
}

impl Drop for ReadSlot {
    fn drop(&mut self) {
        self.0.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Reads on a helper thread and gives up after `timeout`.
///
/// A stalled read keeps its thread and slot until the kernel returns. Once
/// every slot is taken, further reads fail immediately with `WouldBlock`
/// instead of spawning more threads.
fn read_with_timeout(
    slots: &'static ReadSlots,
    path: &Path,
    timeout: Duration,
) -> io::Result<String> {
    let slot = slots.acquire().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::WouldBlock,
            format!(
                "not reading {}: {} earlier reads are still stalled",
                path.display(),
                slots.limit
            ),
        )
    })?;

    let (tx, rx) = mpsc::channel();
    let owned = path.to_path_buf();
    std::thread::Builder::new()
        .name("procsnap-read".to_string())
        .spawn(move || {
            let result = std::fs::read_to_string(&owned);
            drop(slot);
            let _ = tx.send(result);
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("read of {} timed out after {:?}", path.display(), timeout),
        )),
        Err(RecvTimeoutError::Disconnected) => Err(io::Error::other(format!(
            "reader for {} exited without a result",
            path.display()
        ))),
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        match self.read_timeout {
            Some(timeout) => read_with_timeout(&READER_SLOTS, path, timeout),
            None => std::fs::read_to_string(path),
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }
}
