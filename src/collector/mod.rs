//! Process metrics collector for Linux.
//!
//! Reads the `/proc` pseudo-filesystem through the [`FileSystem`] trait, so
//! the same code runs against the real kernel or an in-memory [`MockFs`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Collector                         │
//! │  ┌────────────────────┐   ┌───────────────────────────┐  │
//! │  │  ProcessCollector  │   │     SystemCollector       │  │
//! │  │  - /proc/[pid]/stat│   │  - /proc/uptime           │  │
//! │  └─────────┬──────────┘   │  - /proc/meminfo          │  │
//! │            │              └─────────────┬─────────────┘  │
//! │            └──────── MetricCalculator ──┘                │
//! │                           │                              │
//! │                    ┌──────▼──────┐                       │
//! │                    │  FileSystem │ (trait)               │
//! │                    └──────┬──────┘                       │
//! └───────────────────────────┼──────────────────────────────┘
//!                      ┌──────┴──────┐
//!               ┌──────▼──────┐ ┌────▼────────┐
//!               │   RealFs    │ │   MockFs    │
//!               └─────────────┘ └─────────────┘
//! ```
//!
//! ```
//! use procsnap::collector::{Collector, MetricCalculator, MockFs};
//!
//! let fs = MockFs::typical_system();
//! let mut collector = Collector::new(fs, "/proc").with_calculator(MetricCalculator::new(100, 4096));
//! let snapshot = collector.collect_snapshot().unwrap();
//! assert_eq!(snapshot.len(), 3);
//! ```

#[allow(clippy::module_inception)]
mod collector;
pub mod mock;
pub mod procfs;
pub mod traits;

pub use collector::{CollectionSummary, Collector, CollectorConfig, CollectorTiming};
pub use mock::MockFs;
pub use procfs::{CollectError, MetricCalculator, Severity, SystemBaseline};
pub use traits::{FileSystem, RealFs};
