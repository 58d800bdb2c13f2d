//! System collector for the run-wide baseline read from `/proc/`.

use std::path::Path;

use crate::collector::procfs::metrics::SystemBaseline;
use crate::collector::procfs::parser::{parse_mem_total, parse_uptime};
use crate::collector::procfs::process::CollectError;
use crate::collector::traits::FileSystem;

/// Reads system-wide values from `/proc/`. Any failure here is serious.
pub struct SystemCollector<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> SystemCollector<F> {
    /// Creates a new system collector.
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

    /// Seconds since boot from `/proc/uptime`.
    pub fn read_uptime(&self) -> Result<f64, CollectError> {
        let path = format!("{}/uptime", self.proc_path);
        let content = self
            .fs
            .read_to_string(Path::new(&path))
            .map_err(|e| CollectError::UptimeUnavailable(format!("{}: {}", path, e)))?;
        parse_uptime(&content).map_err(|e| CollectError::UptimeUnavailable(e.message))
    }

    /// `MemTotal` in kB from `/proc/meminfo`.
    pub fn read_mem_total(&self) -> Result<f64, CollectError> {
        let path = format!("{}/meminfo", self.proc_path);
        let content = self
            .fs
            .read_to_string(Path::new(&path))
            .map_err(|e| CollectError::MemInfoUnavailable(format!("{}: {}", path, e)))?;
        parse_mem_total(&content).map_err(|e| CollectError::MemInfoUnavailable(e.message))
    }

    /// Reads both baseline values.
    pub fn read_baseline(&self) -> Result<SystemBaseline, CollectError> {
        Ok(SystemBaseline {
            uptime_seconds: self.read_uptime()?,
            total_memory_kb: self.read_mem_total()?,
        })
    }
}
