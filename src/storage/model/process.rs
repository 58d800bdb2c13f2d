//! Per-process metrics derived from `/proc/[pid]/stat`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Elapsed run time of a process, broken down into clock components.
///
/// This is a relative duration since process start, not a wall-clock time.
/// Wire format: `<h>:<m>:<s>.<ms>` with unpadded integers, e.g. `1:34:2.280`.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct ElapsedTime {
    pub hours: u64,
    /// Always < 60.
    pub minutes: u32,
    /// Always < 60; truncated, never rounded.
    pub seconds: u32,
    /// Always < 1000; rounded from the fractional second.
    pub milliseconds: u32,
}

impl ElapsedTime {
    /// Breaks a non-negative number of seconds into hours, minutes, seconds and milliseconds.
    ///
    /// A millisecond component that rounds up to 1000 carries into the seconds.
    pub fn from_seconds(total: f64) -> Self {
        let total = total.max(0.0);
        let mut hours = (total / 3600.0).floor() as u64;
        let mut minutes = ((total - hours as f64 * 3600.0) / 60.0).floor() as u32;
        let remaining = total - hours as f64 * 3600.0 - minutes as f64 * 60.0;
        let mut seconds = remaining.trunc() as u32;
        let mut milliseconds = ((remaining - seconds as f64) * 1000.0).round() as u32;

        if milliseconds >= 1000 {
            milliseconds -= 1000;
            seconds += 1;
        }
        if seconds >= 60 {
            seconds -= 60;
            minutes += 1;
        }
        if minutes >= 60 {
            minutes -= 60;
            hours += 1;
        }

        Self {
            hours,
            minutes,
            seconds,
            milliseconds,
        }
    }

    /// Returns `true` when every component is zero.
    ///
    /// Kernel workers and zombies produce this; their metrics are meaningless.
    pub fn is_zero(&self) -> bool {
        self.hours == 0 && self.minutes == 0 && self.seconds == 0 && self.milliseconds == 0
    }

    /// Total duration in seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.hours as f64 * 3600.0
            + self.minutes as f64 * 60.0
            + self.seconds as f64
            + self.milliseconds as f64 / 1000.0
    }
}

impl fmt::Display for ElapsedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}.{}",
            self.hours, self.minutes, self.seconds, self.milliseconds
        )
    }
}

/// Error returned when an `<h>:<m>:<s>.<ms>` token cannot be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseElapsedError {
    pub input: String,
}

impl fmt::Display for ParseElapsedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid elapsed time '{}', expected h:m:s.ms", self.input)
    }
}

impl std::error::Error for ParseElapsedError {}

impl FromStr for ElapsedTime {
    type Err = ParseElapsedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseElapsedError {
            input: s.to_string(),
        };

        let mut parts = s.splitn(3, ':');
        let hours = parts.next().ok_or_else(err)?;
        let minutes = parts.next().ok_or_else(err)?;
        let rest = parts.next().ok_or_else(err)?;
        let (seconds, milliseconds) = rest.split_once('.').ok_or_else(err)?;

        Ok(Self {
            hours: hours.parse().map_err(|_| err())?,
            minutes: minutes.parse().map_err(|_| err())?,
            seconds: seconds.parse().map_err(|_| err())?,
            milliseconds: milliseconds.parse().map_err(|_| err())?,
        })
    }
}

/// Resource usage of one process at snapshot time.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ProcessMetrics {
    /// CPU time as a percentage of the process's lifetime.
    /// Can exceed 100 for multi-threaded processes.
    pub cpu_percent: f64,

    /// Resident memory as a percentage of `MemTotal`.
    pub memory_percent: f64,

    /// Source: `/proc/[pid]/stat` field 20 (num_threads)
    pub thread_count: u32,

    /// Time since process start.
    pub uptime: ElapsedTime,
}
