//! Turns raw stat counters into percentages and durations.
//!
//! ```text
//! total_ticks = utime + stime
//! elapsed     = uptime - starttime / CLK_TCK
//! cpu%        = 100 * (total_ticks / CLK_TCK) / elapsed
//! mem%        = 100 * (rss * PAGE_SIZE) / (MemTotal_kB * 1024)
//! ```

use tracing::warn;

use crate::collector::procfs::parser::{RawStatFields, StatField};
use crate::collector::procfs::process::CollectError;
use crate::storage::model::{ElapsedTime, ProcessId, ProcessMetrics};
use crate::util;

/// Fallback when `sysconf(_SC_CLK_TCK)` fails. Standard value for Linux.
const DEFAULT_CLK_TCK: u64 = 100;
/// Fallback when `sysconf(_SC_PAGESIZE)` fails.
const DEFAULT_PAGE_SIZE: u64 = 4096;

/// System-wide inputs shared by every per-process calculation in one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemBaseline {
    /// Seconds since boot, from `/proc/uptime`.
    pub uptime_seconds: f64,
    /// `MemTotal` from `/proc/meminfo`, in kB.
    pub total_memory_kb: f64,
}

/// Pure metric calculations parameterised by platform constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricCalculator {
    ticks_per_second: f64,
    page_size: f64,
}

impl MetricCalculator {
    pub fn new(ticks_per_second: u64, page_size: u64) -> Self {
        Self {
            ticks_per_second: ticks_per_second as f64,
            page_size: page_size as f64,
        }
    }

    /// Uses the running kernel's clock tick rate and page size.
    pub fn from_system() -> Self {
        let ticks = util::clock_ticks_per_second().unwrap_or_else(|| {
            warn!(
                "cannot query clock ticks per second, assuming {}",
                DEFAULT_CLK_TCK
            );
            DEFAULT_CLK_TCK
        });
        let page_size = util::page_size().unwrap_or_else(|| {
            warn!("cannot query page size, assuming {}", DEFAULT_PAGE_SIZE);
            DEFAULT_PAGE_SIZE
        });
        Self::new(ticks, page_size)
    }

    pub fn ticks_per_second(&self) -> f64 {
        self.ticks_per_second
    }

    pub fn page_size(&self) -> f64 {
        self.page_size
    }

    /// Seconds the process has existed.
    ///
    /// A non-positive result means the start time is malformed, which is serious.
    pub fn elapsed_seconds(
        &self,
        pid: ProcessId,
        fields: &RawStatFields,
        baseline: &SystemBaseline,
    ) -> Result<f64, CollectError> {
        let start_ticks = fields.counter(StatField::StartTicks)? as f64;
        let seconds = baseline.uptime_seconds - start_ticks / self.ticks_per_second;
        if seconds <= 0.0 || !seconds.is_finite() {
            return Err(CollectError::NonPositiveElapsed { pid, seconds });
        }
        Ok(seconds)
    }

    /// CPU time as a percentage of the process lifetime. Not capped at 100.
    pub fn cpu_percent(
        &self,
        pid: ProcessId,
        fields: &RawStatFields,
        baseline: &SystemBaseline,
    ) -> Result<f64, CollectError> {
        let total_ticks = (fields.counter(StatField::UserTicks)?
            + fields.counter(StatField::KernelTicks)?) as f64;
        let seconds = self.elapsed_seconds(pid, fields, baseline)?;
        Ok(100.0 * ((total_ticks / self.ticks_per_second) / seconds))
    }

    /// Resident memory as a percentage of total memory.
    pub fn memory_percent(
        &self,
        fields: &RawStatFields,
        baseline: &SystemBaseline,
    ) -> Result<f64, CollectError> {
        let resident_pages = fields.counter(StatField::ResidentPages)? as f64;
        Ok(((resident_pages * self.page_size) / (baseline.total_memory_kb * 1024.0)) * 100.0)
    }

    pub fn thread_count(&self, fields: &RawStatFields) -> Result<u32, CollectError> {
        let threads = fields.counter(StatField::ThreadCount)?;
        u32::try_from(threads)
            .map_err(|_| CollectError::Unexpected(format!("thread count {} overflows", threads)))
    }

    /// Elapsed-time breakdown.
    ///
    /// An all-zero breakdown marks a kernel worker or zombie and is rejected
    /// as harmless so it never reaches an export.
    pub fn elapsed_time(
        &self,
        pid: ProcessId,
        fields: &RawStatFields,
        baseline: &SystemBaseline,
    ) -> Result<ElapsedTime, CollectError> {
        let seconds = self.elapsed_seconds(pid, fields, baseline)?;
        let uptime = ElapsedTime::from_seconds(seconds);
        if uptime.is_zero() {
            return Err(CollectError::EphemeralProcess(pid));
        }
        Ok(uptime)
    }

    /// Computes every metric of one process.
    pub fn compute(
        &self,
        pid: ProcessId,
        fields: &RawStatFields,
        baseline: &SystemBaseline,
    ) -> Result<ProcessMetrics, CollectError> {
        Ok(ProcessMetrics {
            cpu_percent: self.cpu_percent(pid, fields, baseline)?,
            memory_percent: self.memory_percent(fields, baseline)?,
            thread_count: self.thread_count(fields)?,
            uptime: self.elapsed_time(pid, fields, baseline)?,
        })
    }
}

impl Default for MetricCalculator {
    fn default() -> Self {
        Self::from_system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::procfs::process::Severity;

    fn reference_fields() -> RawStatFields {
        let mut fields = RawStatFields::new();
        fields.insert(StatField::UserTicks, "125");
        fields.insert(StatField::KernelTicks, "954");
        fields.insert(StatField::ThreadCount, "3");
        fields.insert(StatField::StartTicks, "4685");
        fields.insert(StatField::ResidentPages, "1696");
        fields
    }

    fn reference_baseline() -> SystemBaseline {
        SystemBaseline {
            uptime_seconds: 5689.13,
            total_memory_kb: 8131976.0,
        }
    }

    #[test]
    fn test_cpu_percent_reference() {
        let calc = MetricCalculator::new(100, 4096);
        let cpu = calc
            .cpu_percent(666, &reference_fields(), &reference_baseline())
            .unwrap();
        assert!((cpu - 0.19123474907306975).abs() < 1e-12, "cpu = {}", cpu);
    }

    #[test]
    fn test_memory_percent_reference() {
        let calc = MetricCalculator::new(100, 4096);
        let mem = calc
            .memory_percent(&reference_fields(), &reference_baseline())
            .unwrap();
        assert!((mem - 0.08342375825998502).abs() < 1e-12, "mem = {}", mem);
    }

    #[test]
    fn test_elapsed_time_reference() {
        let calc = MetricCalculator::new(100, 4096);
        let t = calc
            .elapsed_time(666, &reference_fields(), &reference_baseline())
            .unwrap();
        assert_eq!(
            (t.hours, t.minutes, t.seconds, t.milliseconds),
            (1, 34, 2, 280)
        );
    }

    #[test]
    fn test_compute_reference() {
        let calc = MetricCalculator::new(100, 4096);
        let metrics = calc
            .compute(666, &reference_fields(), &reference_baseline())
            .unwrap();
        assert_eq!(metrics.thread_count, 3);
        assert_eq!(metrics.uptime.to_string(), "1:34:2.280");
    }

    #[test]
    fn test_cpu_can_exceed_hundred() {
        let calc = MetricCalculator::new(100, 4096);
        let mut fields = reference_fields();
        // 8 cores busy for the whole lifetime.
        fields.insert(StatField::UserTicks, "800000");
        fields.insert(StatField::KernelTicks, "0");
        fields.insert(StatField::StartTicks, "0");
        let baseline = SystemBaseline {
            uptime_seconds: 1000.0,
            total_memory_kb: 1024.0,
        };
        let cpu = calc.cpu_percent(1, &fields, &baseline).unwrap();
        assert!((cpu - 800.0).abs() < 1e-9);
    }

    #[test]
    fn test_start_after_uptime_is_serious() {
        let calc = MetricCalculator::new(100, 4096);
        let mut fields = reference_fields();
        fields.insert(StatField::StartTicks, "600000");

        let err = calc
            .cpu_percent(666, &fields, &reference_baseline())
            .unwrap_err();
        assert!(matches!(err, CollectError::NonPositiveElapsed { pid: 666, .. }));
        assert_eq!(err.severity(), Severity::Serious);
    }

    #[test]
    fn test_zero_elapsed_is_harmless() {
        let calc = MetricCalculator::new(100, 4096);
        let mut fields = reference_fields();
        // Started 0.0002s before the uptime reading: rounds to 0ms.
        fields.insert(StatField::StartTicks, "100000");
        let baseline = SystemBaseline {
            uptime_seconds: 1000.0002,
            total_memory_kb: 8131976.0,
        };

        let err = calc.elapsed_time(7, &fields, &baseline).unwrap_err();
        assert!(matches!(err, CollectError::EphemeralProcess(7)));
        assert_eq!(err.severity(), Severity::Harmless);
    }

    #[test]
    fn test_non_numeric_counter_is_unexpected() {
        let calc = MetricCalculator::new(100, 4096);
        let mut fields = reference_fields();
        fields.insert(StatField::ResidentPages, "lots");

        let err = calc
            .memory_percent(&fields, &reference_baseline())
            .unwrap_err();
        assert!(matches!(err, CollectError::Unexpected(_)));
    }

    #[test]
    fn test_from_system_has_positive_constants() {
        let calc = MetricCalculator::from_system();
        assert!(calc.ticks_per_second() > 0.0);
        assert!(calc.page_size() > 0.0);
    }
}
