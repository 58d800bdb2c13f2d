//! procsnap - point-in-time process resource snapshots.
//!
//! This library provides the pieces shared by the `procsnap` binary:
//! - `collector` - reads `/proc`, derives per-process metrics, applies the
//!   skip/abort failure policy
//! - `storage` - snapshot model, flat-file exporter, paginated loader, validator
//! - `fmt` - percent formatting used by the export format
//! - `util` - OS queries (clock ticks, page size, process limits)

pub mod collector;
pub mod fmt;
pub mod storage;
pub mod util;
