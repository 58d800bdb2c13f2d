//! In-memory `/proc` for tests.
//!
//! `MockFs` plus canned scenarios (healthy system, zombie, odd executable
//! names, broken processes, missing baselines).

mod filesystem;
mod scenarios;

pub use filesystem::MockFs;
pub use scenarios::REFERENCE_STAT;
