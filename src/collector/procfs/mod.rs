//! Collectors for the Linux `/proc` filesystem.
//!
//! - [`parser`]: pure parsers for stat lines, `uptime` and `meminfo`
//! - [`metrics`]: CPU%, memory%, threads and elapsed time from raw counters
//! - [`process`]: per-process reads and the severity-tagged error type
//! - [`system`]: the run-wide baseline

pub mod metrics;
pub mod parser;
pub mod process;
pub mod system;

pub use metrics::{MetricCalculator, SystemBaseline};
pub use parser::{RawStatFields, StatField, parse_stat_fields};
pub use process::{CollectError, ProcessCollector, Severity};
pub use system::SystemCollector;
