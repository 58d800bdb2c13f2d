//! Platform constants queried from the OS.
//!
//! Clock ticks and page size never change for the life of the process, so
//! they are queried once and cached.

use std::sync::LazyLock;

static CLOCK_TICKS: LazyLock<Option<u64>> = LazyLock::new(|| query_sysconf(libc::_SC_CLK_TCK));
static PAGE_SIZE: LazyLock<Option<u64>> = LazyLock::new(|| query_sysconf(libc::_SC_PAGESIZE));

/// Returns the kernel's clock ticks per second (`USER_HZ`), if it can be queried.
pub fn clock_ticks_per_second() -> Option<u64> {
    *CLOCK_TICKS
}

/// Returns the memory page size in bytes, if it can be queried.
pub fn page_size() -> Option<u64> {
    *PAGE_SIZE
}

/// Returns the soft `RLIMIT_NPROC` limit for the current user.
///
/// `None` means the limit is either unlimited or could not be queried; both
/// are treated as "no limit" by callers.
pub fn max_user_processes() -> Option<u64> {
    let mut rl = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `rl` is a valid, writable rlimit struct for the duration of the call.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_NPROC, &mut rl) };
    if rc != 0 || rl.rlim_cur == libc::RLIM_INFINITY {
        return None;
    }
    Some(rl.rlim_cur as u64)
}

fn query_sysconf(name: libc::c_int) -> Option<u64> {
    // SAFETY: sysconf has no memory-safety preconditions.
    let value = unsafe { libc::sysconf(name) };
    (value > 0).then_some(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_ticks_is_positive() {
        assert!(clock_ticks_per_second().is_some_and(|hz| hz > 0));
    }

    #[test]
    fn test_page_size_is_power_of_two() {
        let size = page_size().unwrap();
        assert!(size.is_power_of_two());
    }

    #[test]
    fn test_max_user_processes_consistent() {
        assert_eq!(max_user_processes(), max_user_processes());
    }
}
