//! Pre-built `/proc` states for tests.
//!
//! Every scenario uses a 100 Hz clock and 4096-byte pages when metric values
//! are quoted in comments.

use super::filesystem::MockFs;

/// `/proc/uptime` of [`MockFs::typical_system`].
const TYPICAL_UPTIME: &str = "12345.67 98765.43\n";

/// `/proc/meminfo` of [`MockFs::typical_system`].
const TYPICAL_MEMINFO: &str = "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapTotal:       4096000 kB
SwapFree:        4096000 kB
";

/// Stat record of the reference `dummy` process, pid 666.
pub const REFERENCE_STAT: &str = "666 (dummy) S 1 666 666 0 -1 4194560 2271 2377 16 141 125 954 0 0 20 0 3 0 4685 328105984 1696 18446744073709551615 1 1 0 0 0 0 0 4096 0 0 0 0 17 1 0 0 0 0 0 0 0 0 0 0 0 0 0";

impl MockFs {
    /// One process with hand-checked metrics.
    ///
    /// With uptime 5689.13s and 8131976 kB of memory, pid 666 has
    /// cpu 0.19123474907306975%, memory 0.08342375825998502% and has been
    /// running for 1:34:2.280. Non-process entries sit next to it.
    pub fn reference_process() -> Self {
        let mut fs = Self::new();
        fs.add_file("/proc/uptime", "5689.13 21013.48\n");
        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:        8131976 kB
MemFree:         1200000 kB
MemAvailable:    4000000 kB
",
        );
        fs.add_dir("/proc/fs");
        fs.add_process(666, REFERENCE_STAT);
        fs
    }

    /// A small healthy system: init, a shell and a daemon.
    pub fn typical_system() -> Self {
        let mut fs = Self::new();

        fs.add_file("/proc/uptime", TYPICAL_UPTIME);
        fs.add_file("/proc/meminfo", TYPICAL_MEMINFO);
        fs.add_file("/proc/loadavg", "0.15 0.10 0.05 1/150 1234\n");
        fs.add_dir("/proc/fs");
        fs.add_dir("/proc/sys");
        fs.add_dir("/proc/self");

        fs.add_process(
            1,
            "1 (systemd) S 0 1 1 0 -1 4194560 50000 0 100 0 1000 500 0 0 20 0 1 0 1 170000000 3000 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0",
        );
        fs.add_process(
            1000,
            "1000 (bash) S 1 1000 1000 34816 1000 4194304 5000 20000 0 5 200 50 100 30 20 0 1 0 100000 25000000 1250 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0 0 0 0 0 0 0 0 0",
        );
        fs.add_process(
            1001,
            "1001 (sshd) S 1 1001 1001 0 -1 4194560 2000 0 10 0 30 20 0 0 20 0 1 0 150000 15000000 2000 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 2 0 0 0 0 0 0 0 0 0 0 0 0 0",
        );

        fs
    }

    /// Typical system plus a zombie whose start time equals the measured uptime.
    ///
    /// The uptime reading carries sub-tick precision so the zombie's elapsed
    /// time is 0.4ms, which rounds to an all-zero breakdown.
    pub fn with_zombie_process() -> Self {
        let mut fs = Self::typical_system();
        fs.add_file("/proc/uptime", "12345.6704 98765.43\n");
        fs.add_process(
            4000,
            "4000 (defunct) Z 1000 4000 1000 0 -1 4194308 0 0 0 0 0 0 0 0 20 0 1 0 1234567 0 0 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 -1 0 0 0 0 0 0 0 0 0 0 0 0 0 0",
        );
        fs
    }

    /// Typical system plus executable names with spaces and parentheses.
    pub fn with_special_names() -> Self {
        let mut fs = Self::typical_system();

        // Firefox content processes
        fs.add_process(
            5000,
            "5000 (Web Content) S 4999 5000 4999 0 -1 4194304 100000 0 500 0 5000 1000 0 0 20 0 20 0 500000 2000000000 50000 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0",
        );
        fs.add_process(
            5001,
            "5001 (test (1) x) S 1 5001 5001 0 -1 4194304 1000 0 0 0 10 5 0 0 20 0 1 0 500100 10000000 1000 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0",
        );

        fs
    }

    /// Typical system plus processes whose data cannot be used.
    ///
    /// - 6000: truncated stat record
    /// - 6001: stat record without a parenthesised name
    /// - 6002: process directory without a stat file (exited mid-scan)
    /// - 6003: non-numeric counter
    pub fn with_broken_processes() -> Self {
        let mut fs = Self::typical_system();
        fs.add_process(6000, "6000 (short) S 1 6000 6000 0 -1 0 0 0 0 0 7 8 0 0 20 0 1");
        fs.add_process(6001, "6001 noparens S 1 6001 6001 0 -1 0 0 0 0 0 7 8 0 0 20 0 1 0 5 0 9");
        fs.add_dir("/proc/6002");
        fs.add_process(
            6003,
            "6003 (odd) S 1 6003 6003 0 -1 4194304 0 0 0 0 ten 5 0 0 20 0 1 0 500100 10000000 1000 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0",
        );
        fs
    }

    /// Typical system plus a process that claims to start after the uptime reading.
    pub fn with_malformed_start() -> Self {
        let mut fs = Self::typical_system();
        fs.add_process(
            7000,
            "7000 (future) S 1 7000 7000 0 -1 4194304 0 0 0 0 1 1 0 0 20 0 1 0 9999999 10000000 100 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0 0 0 0 0 0 0 0 0",
        );
        fs
    }

    /// Typical system whose `/proc/uptime` is gone.
    pub fn missing_uptime() -> Self {
        let mut fs = Self::typical_system();
        fs.remove_file("/proc/uptime");
        fs
    }

    /// Typical system whose `/proc/meminfo` has no `MemTotal` line.
    pub fn missing_mem_total() -> Self {
        let mut fs = Self::typical_system();
        fs.add_file("/proc/meminfo", "MemFree:         8192000 kB\n");
        fs
    }
}
