//! Writes a snapshot in the line format.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::fmt::format_percent;
use crate::storage::model::{ProcessId, ProcessMetrics, Snapshot};

/// Renders one process as a line, without the trailing newline.
pub fn format_line(pid: ProcessId, metrics: &ProcessMetrics) -> String {
    format!(
        "Pid: {} cpu: {} memory: {} threads: {} time: {}",
        pid,
        format_percent(metrics.cpu_percent),
        format_percent(metrics.memory_percent),
        metrics.thread_count,
        metrics.uptime
    )
}

/// Renders the whole snapshot in pid order, one newline-terminated line per process.
pub fn render_snapshot(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for (pid, metrics) in snapshot.iter() {
        out.push_str(&format_line(pid, metrics));
        out.push('\n');
    }
    out
}

/// Writes `snapshot` to `path`, replacing any existing file.
pub fn export_snapshot(snapshot: &Snapshot, path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    for (pid, metrics) in snapshot.iter() {
        writeln!(writer, "{}", format_line(pid, metrics))?;
    }
    writer.flush()?;
    debug!("wrote {} lines to {}", snapshot.len(), path.display());
    Ok(())
}
