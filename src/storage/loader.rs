//! Reads an exported snapshot back and hands it out page by page.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::fmt::parse_percent;
use crate::storage::export::format_line;
use crate::storage::model::{ElapsedTime, ProcessId, ProcessMetrics, Snapshot};

/// Keys of one exported line, in order.
pub(crate) const KEYS: [&str; 5] = ["Pid", "cpu", "memory", "threads", "time"];

/// Error type for loading failures.
#[derive(Debug)]
pub enum LoadError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// `line` is 1-based.
    Parse { line: usize, message: String },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            LoadError::Parse { line, message } => write!(f, "line {}: {}", line, message),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io { source, .. } => Some(source),
            LoadError::Parse { .. } => None,
        }
    }
}

/// Paginated reader over a loaded snapshot.
///
/// The cursor is a plain offset into the snapshot's pid order, so reloading
/// never leaves a dangling position behind. One loader belongs to one caller.
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    snapshot: Snapshot,
    order: Vec<ProcessId>,
    cursor: usize,
}

impl SnapshotLoader {
    /// Loads an exported file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let loader = Self::parse(&content)?;
        debug!("loaded {} processes from {}", loader.len(), path.display());
        Ok(loader)
    }

    /// Parses exported text. Blank lines are ignored.
    ///
    /// A pid seen twice keeps its first record.
    pub fn parse(content: &str) -> Result<Self, LoadError> {
        let mut snapshot = Snapshot::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (pid, metrics) = parse_line(line).map_err(|message| LoadError::Parse {
                line: index + 1,
                message,
            })?;
            if !snapshot.insert(pid, metrics) {
                warn!(
                    "line {}: duplicate pid {}, keeping the first record",
                    index + 1,
                    pid
                );
            }
        }
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let order = snapshot.pids().collect();
        Self {
            snapshot,
            order,
            cursor: 0,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns up to `step` entries not yet handed out and advances the cursor.
    ///
    /// Empty once exhausted, and always empty for `step == 0`.
    pub fn next_page(&mut self, step: usize) -> Vec<(ProcessId, ProcessMetrics)> {
        let end = self.cursor.saturating_add(step).min(self.order.len());
        let page = self.order[self.cursor..end]
            .iter()
            .filter_map(|&pid| self.snapshot.get(pid).map(|m| (pid, *m)))
            .collect();
        self.cursor = end;
        page
    }

    /// Rewinds to the first entry.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.order.len()
    }

    /// Number of entries already handed out.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Logs every loaded entry at info level.
    pub fn log_entries(&self) {
        info!("snapshot holds {} processes", self.len());
        for (pid, metrics) in self.snapshot.iter() {
            info!("{}", format_line(pid, metrics));
        }
    }
}

fn parse_line(line: &str) -> Result<(ProcessId, ProcessMetrics), String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != KEYS.len() * 2 {
        return Err(format!(
            "expected {} key/value pairs, found {} tokens",
            KEYS.len(),
            tokens.len()
        ));
    }

    let mut values = [""; 5];
    for (i, expected) in KEYS.iter().enumerate() {
        let key = tokens[i * 2];
        let name = key
            .strip_suffix(':')
            .ok_or_else(|| format!("key '{}' lacks a colon", key))?;
        if name != *expected {
            return Err(format!("expected key '{}', found '{}'", expected, name));
        }
        values[i] = tokens[i * 2 + 1];
    }
    let [pid, cpu, memory, threads, time] = values;

    let pid = pid
        .parse::<ProcessId>()
        .map_err(|_| format!("invalid pid '{}'", pid))?;
    let cpu_percent = parse_percent(cpu).ok_or_else(|| format!("invalid cpu '{}'", cpu))?;
    let memory_percent =
        parse_percent(memory).ok_or_else(|| format!("invalid memory '{}'", memory))?;
    let thread_count = threads
        .parse()
        .map_err(|_| format!("invalid threads '{}'", threads))?;
    let uptime = time
        .parse::<ElapsedTime>()
        .map_err(|e| e.to_string())?;

    Ok((
        pid,
        ProcessMetrics {
            cpu_percent,
            memory_percent,
            thread_count,
            uptime,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIVE_PROCESSES: &str = "\
Pid: 5 cpu: 1.50% memory: 0.25% threads: 1 time: 0:0:10.0
Pid: 1 cpu: 0.19% memory: 0.08% threads: 3 time: 1:34:2.280
Pid: 4 cpu: 0.00% memory: 0.00% threads: 2 time: 0:0:0.10
Pid: 2 cpu: 12.54% memory: 45.00% threads: 120 time: 25:1:1.500
Pid: 3 cpu: 99.99% memory: 1.00% threads: 8 time: 0:1:0.0
";

    fn pids(page: &[(ProcessId, ProcessMetrics)]) -> Vec<ProcessId> {
        page.iter().map(|(pid, _)| *pid).collect()
    }

    #[test]
    fn test_parse_reference_line() {
        let loader =
            SnapshotLoader::parse("Pid: 666 cpu: 0.19% memory: 0.08% threads: 3 time: 1:34:2.280\n")
                .unwrap();
        let metrics = loader.snapshot().get(666).unwrap();
        assert_eq!(metrics.cpu_percent, 0.19);
        assert_eq!(metrics.memory_percent, 0.08);
        assert_eq!(metrics.thread_count, 3);
        assert_eq!(metrics.uptime.to_string(), "1:34:2.280");
    }

    #[test]
    fn test_next_page_steps_of_two() {
        let mut loader = SnapshotLoader::parse(FIVE_PROCESSES).unwrap();
        assert_eq!(loader.len(), 5);

        assert_eq!(pids(&loader.next_page(2)), vec![1, 2]);
        assert_eq!(pids(&loader.next_page(2)), vec![3, 4]);
        assert!(!loader.is_exhausted());
        assert_eq!(pids(&loader.next_page(2)), vec![5]);
        assert!(loader.is_exhausted());
        assert!(loader.next_page(2).is_empty());
    }

    #[test]
    fn test_next_page_larger_than_snapshot() {
        let mut loader = SnapshotLoader::parse(FIVE_PROCESSES).unwrap();
        assert_eq!(loader.next_page(10).len(), 5);
        assert!(loader.is_exhausted());
        assert_eq!(loader.position(), 5);
    }

    #[test]
    fn test_next_page_zero_step() {
        let mut loader = SnapshotLoader::parse(FIVE_PROCESSES).unwrap();
        assert!(loader.next_page(0).is_empty());
        assert_eq!(loader.position(), 0);
        assert!(!loader.is_exhausted());
    }

    #[test]
    fn test_reset_rewinds() {
        let mut loader = SnapshotLoader::parse(FIVE_PROCESSES).unwrap();
        loader.next_page(3);
        loader.next_page(3);
        assert!(loader.is_exhausted());

        loader.reset();
        assert_eq!(loader.position(), 0);
        assert_eq!(pids(&loader.next_page(1)), vec![1]);
    }

    #[test]
    fn test_empty_file_is_exhausted() {
        let mut loader = SnapshotLoader::parse("").unwrap();
        assert!(loader.is_empty());
        assert!(loader.is_exhausted());
        assert!(loader.next_page(3).is_empty());
    }

    #[test]
    fn test_duplicate_pid_keeps_first() {
        let content = "\
Pid: 7 cpu: 1.00% memory: 1.00% threads: 1 time: 0:0:1.0
Pid: 7 cpu: 2.00% memory: 2.00% threads: 2 time: 0:0:2.0
";
        let loader = SnapshotLoader::parse(content).unwrap();
        assert_eq!(loader.len(), 1);
        assert_eq!(loader.snapshot().get(7).unwrap().thread_count, 1);
    }

    #[test]
    fn test_parse_errors_name_the_line() {
        let content = "\
Pid: 7 cpu: 1.00% memory: 1.00% threads: 1 time: 0:0:1.0
Pid: 8 memory: 1.00% cpu: 1.00% threads: 1 time: 0:0:1.0
";
        match SnapshotLoader::parse(content).unwrap_err() {
            LoadError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("cpu"), "{}", message);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        for line in [
            "Pid: x cpu: 1.00% memory: 1.00% threads: 1 time: 0:0:1.0",
            "Pid: 1 cpu: 1.00% memory: 1.00% threads: -1 time: 0:0:1.0",
            "Pid: 1 cpu: 1.00% memory: 1.00% threads: 1 time: 0:0",
            "Pid: 1 cpu: 1.00% memory: 1.00% threads: 1",
            "Pid 1 cpu: 1.00% memory: 1.00% threads: 1 time: 0:0:1.0",
        ] {
            assert!(SnapshotLoader::parse(line).is_err(), "{}", line);
        }
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = SnapshotLoader::from_path("/nonexistent/ProcessesStatus.txt").unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
