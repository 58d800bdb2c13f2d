//! Data models for snapshots.
//!
//! - [`process`]: per-process metrics and the elapsed-time breakdown
//! - [`snapshot`]: the pid-keyed collection produced by one collection run

mod process;
mod snapshot;

pub use process::{ElapsedTime, ParseElapsedError, ProcessMetrics};
pub use snapshot::{PID_MAX, ProcessId, Snapshot};
