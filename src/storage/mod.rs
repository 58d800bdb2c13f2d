//! On-disk snapshot format.
//!
//! One line per process:
//!
//! ```text
//! Pid: <id> cpu: <pct>% memory: <pct>% threads: <n> time: <h>:<m>:<s>.<ms>
//! ```
//!
//! [`export`] writes it, [`loader`] reads it back for paging and
//! [`validate`] checks the raw text without trusting the loader.

pub mod export;
pub mod loader;
pub mod model;
pub mod validate;

pub use export::{export_snapshot, format_line, render_snapshot};
pub use loader::{LoadError, SnapshotLoader};
pub use model::Snapshot;
pub use validate::{Diagnostic, ValidationReport, Validator, validate_exported_file};
