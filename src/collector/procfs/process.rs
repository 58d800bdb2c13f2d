//! Per-process reads from `/proc/[pid]/` and the collection error taxonomy.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::collector::procfs::parser::{RawStatFields, parse_stat_fields};
use crate::collector::traits::FileSystem;
use crate::storage::model::{PID_MAX, ProcessId};

/// How the collector reacts to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Expected: not a process, or a process whose metrics are meaningless. Skip quietly.
    Harmless,
    /// One process's data could not be obtained. Skip it and warn.
    Moderate,
    /// A system-wide input is broken. Abort the whole run, export nothing.
    Serious,
}

/// Error type for collection failures.
#[derive(Debug)]
pub enum CollectError {
    /// A `/proc` entry whose name is not a process id (`uptime`, `sys`, `self`, ...).
    NotAProcess(String),
    /// The entry has no usable file name.
    UnnamedEntry(PathBuf),
    /// A numeric entry above the kernel's pid ceiling.
    PidOutOfRange(ProcessId),
    /// Zero elapsed time: a kernel worker or a zombie.
    EphemeralProcess(ProcessId),
    /// `/proc/[pid]/stat` could not be read (process exited, permissions, timeout).
    StatUnreadable {
        pid: ProcessId,
        source: std::io::Error,
    },
    /// `/proc/[pid]/stat` was read but is structurally broken.
    MalformedStat { pid: ProcessId, reason: String },
    /// Fewer than all tracked stat positions were present.
    IncompleteStat { pid: ProcessId, found: usize },
    /// `/proc/uptime` missing or unparseable.
    UptimeUnavailable(String),
    /// `/proc/meminfo` missing, unparseable, or without `MemTotal`.
    MemInfoUnavailable(String),
    /// The proc root itself could not be listed.
    ProcRootUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Process start time is at or after the measured system uptime.
    NonPositiveElapsed { pid: ProcessId, seconds: f64 },
    /// The snapshot could not be written.
    Export {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Anything not covered above, e.g. a non-numeric counter token.
    Unexpected(String),
}

impl CollectError {
    /// Classifies this error for the skip/abort policy.
    ///
    /// `Unexpected` is handled like `Moderate`.
    pub fn severity(&self) -> Severity {
        match self {
            CollectError::NotAProcess(_) | CollectError::EphemeralProcess(_) => Severity::Harmless,
            CollectError::UnnamedEntry(_)
            | CollectError::PidOutOfRange(_)
            | CollectError::StatUnreadable { .. }
            | CollectError::MalformedStat { .. }
            | CollectError::IncompleteStat { .. }
            | CollectError::Unexpected(_) => Severity::Moderate,
            CollectError::UptimeUnavailable(_)
            | CollectError::MemInfoUnavailable(_)
            | CollectError::ProcRootUnreadable { .. }
            | CollectError::NonPositiveElapsed { .. }
            | CollectError::Export { .. } => Severity::Serious,
        }
    }

    pub fn is_serious(&self) -> bool {
        self.severity() == Severity::Serious
    }
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectError::NotAProcess(name) => write!(f, "'{}' is not a process entry", name),
            CollectError::UnnamedEntry(path) => {
                write!(f, "cannot extract pid from entry {}", path.display())
            }
            CollectError::PidOutOfRange(pid) => {
                write!(f, "pid {} exceeds the pid ceiling {}", pid, PID_MAX)
            }
            CollectError::EphemeralProcess(pid) => write!(
                f,
                "process {} has zero elapsed time (kernel worker or zombie), metrics are fake",
                pid
            ),
            CollectError::StatUnreadable { pid, source } => {
                write!(f, "stat file of process {} unreadable: {}", pid, source)
            }
            CollectError::MalformedStat { pid, reason } => {
                write!(f, "stat record of process {} is malformed: {}", pid, reason)
            }
            CollectError::IncompleteStat { pid, found } => write!(
                f,
                "stat record of process {} is incomplete: {} of {} tracked fields",
                pid,
                found,
                RawStatFields::TRACKED
            ),
            CollectError::UptimeUnavailable(msg) => write!(f, "system uptime unavailable: {}", msg),
            CollectError::MemInfoUnavailable(msg) => {
                write!(f, "total memory unavailable: {}", msg)
            }
            CollectError::ProcRootUnreadable { path, source } => {
                write!(f, "cannot list {}: {}", path.display(), source)
            }
            CollectError::NonPositiveElapsed { pid, seconds } => write!(
                f,
                "process {} has non-positive elapsed time ({}s), start time is malformed",
                pid, seconds
            ),
            CollectError::Export { path, source } => {
                write!(f, "cannot export snapshot to {}: {}", path.display(), source)
            }
            CollectError::Unexpected(msg) => write!(f, "unexpected error: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::StatUnreadable { source, .. }
            | CollectError::ProcRootUnreadable { source, .. }
            | CollectError::Export { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Reads per-process data from `/proc/[pid]/`.
pub struct ProcessCollector<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> ProcessCollector<F> {
    /// Creates a new process collector.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    /// Lists every entry of the proc root, processes or not.
    pub fn list_entries(&self) -> Result<Vec<PathBuf>, CollectError> {
        let root = Path::new(&self.proc_path);
        self.fs
            .read_dir(root)
            .map_err(|source| CollectError::ProcRootUnreadable {
                path: root.to_path_buf(),
                source,
            })
    }

    /// Extracts the process id from a `/proc` entry path.
    ///
    /// Only all-digit names are processes. Pids above [`PID_MAX`] are
    /// refused here rather than exported.
    pub fn resolve_pid(&self, entry: &Path) -> Result<ProcessId, CollectError> {
        let name = entry
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CollectError::UnnamedEntry(entry.to_path_buf()))?;

        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CollectError::NotAProcess(name.to_string()));
        }

        match name.parse::<ProcessId>() {
            Ok(0) => Err(CollectError::NotAProcess(name.to_string())),
            Ok(pid) if pid > PID_MAX => Err(CollectError::PidOutOfRange(pid)),
            Ok(pid) => Ok(pid),
            Err(e) => Err(CollectError::Unexpected(format!(
                "pid '{}' out of range: {}",
                name, e
            ))),
        }
    }

    /// Reads and extracts the tracked fields of `/proc/[pid]/stat`.
    pub fn read_stat_fields(&self, pid: ProcessId) -> Result<RawStatFields, CollectError> {
        let stat_path = format!("{}/{}/stat", self.proc_path, pid);
        let content = self
            .fs
            .read_to_string(Path::new(&stat_path))
            .map_err(|source| CollectError::StatUnreadable { pid, source })?;

        let line = content.lines().next().unwrap_or_default();
        tracing::debug!("stat record for pid {}: {}", pid, line);

        parse_stat_fields(line).map_err(|e| e.for_pid(pid))
    }
}
