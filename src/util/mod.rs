//! Utility modules for procsnap.

mod sysconf;

pub use sysconf::{clock_ticks_per_second, max_user_processes, page_size};
