//! Main collector that turns `/proc` into a `Snapshot`.
//!
//! Every `/proc` entry goes through resolve pid, read stat, compute metrics.
//! Failures are classified by [`Severity`]: harmless and moderate ones skip
//! the entry, a serious one aborts the run and nothing is exported.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::collector::procfs::{
    CollectError, MetricCalculator, ProcessCollector, Severity, SystemBaseline, SystemCollector,
};
use crate::collector::traits::{FileSystem, RealFs};
use crate::storage::export::export_snapshot;
use crate::storage::model::{ProcessId, ProcessMetrics, Snapshot};

/// Runtime settings of a collection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Root of the process pseudo-filesystem.
    pub proc_path: String,
    /// Threads computing per-process metrics. 1 runs everything on the caller's thread.
    pub workers: usize,
    /// Upper bound for each pseudo-file read when reading the real filesystem.
    pub read_timeout: Option<Duration>,
}

impl CollectorConfig {
    pub const DEFAULT_PROC_PATH: &'static str = "/proc";

    /// Real filesystem honoring `read_timeout`.
    pub fn real_fs(&self) -> RealFs {
        match self.read_timeout {
            Some(timeout) => RealFs::with_read_timeout(timeout),
            None => RealFs::new(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            proc_path: Self::DEFAULT_PROC_PATH.to_string(),
            workers: 1,
            read_timeout: None,
        }
    }
}

/// Per-severity counts of the last run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    /// `/proc` entries looked at.
    pub entries: usize,
    /// Processes that made it into the snapshot.
    pub collected: usize,
    pub harmless: usize,
    pub moderate: usize,
    /// Unclassified failures, skipped like moderate ones.
    pub unexpected: usize,
}

impl CollectionSummary {
    fn absorb(&mut self, other: CollectionSummary) {
        self.entries += other.entries;
        self.collected += other.collected;
        self.harmless += other.harmless;
        self.moderate += other.moderate;
        self.unexpected += other.unexpected;
    }
}

/// Timing information for each collector phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectorTiming {
    pub total: Duration,
    /// Reading `/proc/uptime` and `/proc/meminfo`.
    pub baseline: Duration,
    /// Listing the proc root and computing every process.
    pub processes: Duration,
}

/// Gathers a snapshot of every live process.
pub struct Collector<F: FileSystem + Clone> {
    process_collector: ProcessCollector<F>,
    system_collector: SystemCollector<F>,
    calculator: MetricCalculator,
    workers: usize,
    last_timing: Option<CollectorTiming>,
    last_summary: Option<CollectionSummary>,
}

impl<F: FileSystem + Clone> Collector<F> {
    /// Creates a sequential collector.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        let proc_path = proc_path.into();
        Self {
            process_collector: ProcessCollector::new(fs.clone(), &proc_path),
            system_collector: SystemCollector::new(fs, &proc_path),
            calculator: MetricCalculator::from_system(),
            workers: 1,
            last_timing: None,
            last_summary: None,
        }
    }

    /// Creates a collector from a full configuration.
    pub fn with_config(fs: F, config: &CollectorConfig) -> Self {
        let mut collector = Self::new(fs, &config.proc_path);
        collector.workers = config.workers.max(1);
        collector
    }

    /// Replaces the platform constants, mostly for tests on foreign hosts.
    pub fn with_calculator(mut self, calculator: MetricCalculator) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Returns timing information from the last `collect_snapshot` call.
    pub fn last_timing(&self) -> Option<&CollectorTiming> {
        self.last_timing.as_ref()
    }

    /// Returns the counts from the last successful `collect_snapshot` call.
    pub fn last_summary(&self) -> Option<&CollectionSummary> {
        self.last_summary.as_ref()
    }

    /// Extracts the process id of a `/proc` entry.
    pub fn resolve_pid(&self, entry: &Path) -> Result<ProcessId, CollectError> {
        self.process_collector.resolve_pid(entry)
    }

    /// Resolves, reads and computes one `/proc` entry.
    pub fn collect_process(
        &self,
        entry: &Path,
        baseline: &SystemBaseline,
    ) -> Result<(ProcessId, ProcessMetrics), CollectError> {
        let pid = self.resolve_pid(entry)?;
        let fields = self.process_collector.read_stat_fields(pid)?;
        let metrics = self.calculator.compute(pid, &fields, baseline)?;
        debug!(
            "pid {}: cpu {:.4}% memory {:.4}% threads {} time {}",
            pid, metrics.cpu_percent, metrics.memory_percent, metrics.thread_count, metrics.uptime
        );
        Ok((pid, metrics))
    }

    /// Collects every process under the proc root.
    ///
    /// Baselines are read once before enumeration. Returns the first serious
    /// error if any entry hits one; the partial snapshot is discarded.
    pub fn collect_snapshot(&mut self) -> Result<Snapshot, CollectError> {
        let total_start = Instant::now();
        let mut timing = CollectorTiming::default();

        let result = self.run(&mut timing);
        timing.total = total_start.elapsed();
        self.last_timing = Some(timing);

        match result {
            Ok((snapshot, summary)) => {
                info!(
                    "collected {} processes from {} entries in {:?} ({} harmless, {} moderate, {} unexpected skipped)",
                    summary.collected,
                    summary.entries,
                    timing.total,
                    summary.harmless,
                    summary.moderate,
                    summary.unexpected
                );
                self.last_summary = Some(summary);
                Ok(snapshot)
            }
            Err(e) => {
                error!("collection aborted, nothing exported: {}", e);
                self.last_summary = None;
                Err(e)
            }
        }
    }

    /// Collects a snapshot and writes it to `path`.
    ///
    /// The file is only touched after a complete, successful pass.
    pub fn collect_and_export(&mut self, path: impl AsRef<Path>) -> Result<Snapshot, CollectError> {
        let path = path.as_ref();
        let snapshot = self.collect_snapshot()?;
        export_snapshot(&snapshot, path).map_err(|source| {
            let err = CollectError::Export {
                path: path.to_path_buf(),
                source,
            };
            error!("{}", err);
            err
        })?;
        info!("exported {} processes to {}", snapshot.len(), path.display());
        Ok(snapshot)
    }

    fn run(
        &self,
        timing: &mut CollectorTiming,
    ) -> Result<(Snapshot, CollectionSummary), CollectError> {
        let start = Instant::now();
        let baseline = self.system_collector.read_baseline()?;
        timing.baseline = start.elapsed();
        debug!(
            "baseline: uptime {}s, MemTotal {} kB",
            baseline.uptime_seconds, baseline.total_memory_kb
        );

        let start = Instant::now();
        let entries = self.process_collector.list_entries()?;
        let result = if self.workers > 1 && entries.len() > 1 {
            self.collect_parallel(&entries, &baseline)
        } else {
            self.collect_sequential(&entries, &baseline)
        };
        timing.processes = start.elapsed();
        result
    }

    fn collect_sequential(
        &self,
        entries: &[PathBuf],
        baseline: &SystemBaseline,
    ) -> Result<(Snapshot, CollectionSummary), CollectError> {
        let mut snapshot = Snapshot::new();
        let mut summary = CollectionSummary::default();
        for entry in entries {
            if let Some((pid, metrics)) = self.classify(entry, baseline, &mut summary)? {
                snapshot.insert(pid, metrics);
            }
        }
        Ok((snapshot, summary))
    }

    /// Bounded worker pool over a shared entry index.
    ///
    /// The first serious failure raises `cancelled`; workers stop picking new
    /// entries once it is set. Per-worker snapshots are merged afterwards, so
    /// the result does not depend on scheduling.
    fn collect_parallel(
        &self,
        entries: &[PathBuf],
        baseline: &SystemBaseline,
    ) -> Result<(Snapshot, CollectionSummary), CollectError> {
        let next = AtomicUsize::new(0);
        let cancelled = AtomicBool::new(false);
        let failure: Mutex<Option<CollectError>> = Mutex::new(None);
        let (next, cancelled, failure) = (&next, &cancelled, &failure);
        let workers = self.workers.min(entries.len());
        debug!("collecting {} entries on {} workers", entries.len(), workers);

        let joined = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut snapshot = Snapshot::new();
                        let mut summary = CollectionSummary::default();
                        while !cancelled.load(Ordering::Acquire) {
                            let index = next.fetch_add(1, Ordering::Relaxed);
                            let Some(entry) = entries.get(index) else {
                                break;
                            };
                            match self.classify(entry, baseline, &mut summary) {
                                Ok(Some((pid, metrics))) => {
                                    snapshot.insert(pid, metrics);
                                }
                                Ok(None) => {}
                                Err(e) => {
                                    cancelled.store(true, Ordering::Release);
                                    let mut slot =
                                        failure.lock().unwrap_or_else(PoisonError::into_inner);
                                    slot.get_or_insert(e);
                                    break;
                                }
                            }
                        }
                        (snapshot, summary)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Vec<_>>()
        });

        if let Some(e) = failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(e);
        }

        let mut snapshot = Snapshot::new();
        let mut summary = CollectionSummary::default();
        for partial in joined {
            let (part, counts) = partial
                .map_err(|_| CollectError::Unexpected("collection worker panicked".to_string()))?;
            snapshot.merge(part);
            summary.absorb(counts);
        }
        Ok((snapshot, summary))
    }

    /// Applies the skip/abort policy to one entry.
    ///
    /// `Ok(None)` means the entry was skipped; `Err` is always serious.
    fn classify(
        &self,
        entry: &Path,
        baseline: &SystemBaseline,
        summary: &mut CollectionSummary,
    ) -> Result<Option<(ProcessId, ProcessMetrics)>, CollectError> {
        summary.entries += 1;
        let err = match self.collect_process(entry, baseline) {
            Ok(collected) => {
                summary.collected += 1;
                return Ok(Some(collected));
            }
            Err(err) => err,
        };

        match err.severity() {
            Severity::Harmless => {
                debug!("skipping {}: {}", entry.display(), err);
                summary.harmless += 1;
                Ok(None)
            }
            Severity::Moderate if matches!(err, CollectError::Unexpected(_)) => {
                warn!(
                    "unexpected failure on {}, skipping: {}",
                    entry.display(),
                    err
                );
                summary.unexpected += 1;
                Ok(None)
            }
            Severity::Moderate => {
                warn!("skipping {}: {}", entry.display(), err);
                summary.moderate += 1;
                Ok(None)
            }
            Severity::Serious => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use std::io;
    use std::sync::Arc;

    /// Counts stat reads and slows down every one except `/proc/10/stat`.
    #[derive(Clone)]
    struct CountingFs {
        inner: MockFs,
        stat_reads: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl CountingFs {
        fn new(inner: MockFs, delay: Duration) -> Self {
            Self {
                inner,
                stat_reads: Arc::new(AtomicUsize::new(0)),
                delay,
            }
        }
    }

    impl FileSystem for CountingFs {
        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            if path.ends_with("stat") {
                self.stat_reads.fetch_add(1, Ordering::SeqCst);
                if path != Path::new("/proc/10/stat") {
                    std::thread::sleep(self.delay);
                }
            }
            self.inner.read_to_string(path)
        }

        fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
            let mut entries = self.inner.read_dir(path)?;
            entries.sort();
            Ok(entries)
        }
    }

    /// Pid 10 starts after the uptime reading; `healthy` good processes follow it.
    fn failure_then_healthy(healthy: u32) -> MockFs {
        let mut fs = MockFs::new();
        fs.add_file("/proc/uptime", "12345.67 98765.43\n");
        fs.add_file("/proc/meminfo", "MemTotal:       16384000 kB\n");
        fs.add_process(
            10,
            "10 (future) S 1 10 10 0 -1 4194304 0 0 0 0 1 1 0 0 20 0 1 0 9999999 10000000 100",
        );
        for pid in 100..100 + healthy {
            fs.add_process(
                pid,
                &format!(
                    "{} (worker) S 1 {} {} 0 -1 4194304 0 0 0 0 20 5 0 0 20 0 1 0 100000 10000000 100",
                    pid, pid, pid
                ),
            );
        }
        fs
    }

    fn collector(fs: MockFs) -> Collector<MockFs> {
        Collector::new(fs, "/proc").with_calculator(MetricCalculator::new(100, 4096))
    }

    fn parallel(fs: MockFs, workers: usize) -> Collector<MockFs> {
        let config = CollectorConfig {
            workers,
            ..CollectorConfig::default()
        };
        Collector::with_config(fs, &config).with_calculator(MetricCalculator::new(100, 4096))
    }

    #[test]
    fn test_collect_reference_process() {
        let mut collector = collector(MockFs::reference_process());
        let snapshot = collector.collect_snapshot().unwrap();

        assert_eq!(snapshot.len(), 1);
        let metrics = snapshot.get(666).unwrap();
        assert!((metrics.cpu_percent - 0.19123474907306975).abs() < 1e-12);
        assert!((metrics.memory_percent - 0.08342375825998502).abs() < 1e-12);
        assert_eq!(metrics.thread_count, 3);
        assert_eq!(metrics.uptime.to_string(), "1:34:2.280");
    }

    #[test]
    fn test_non_process_entries_are_harmless() {
        let mut collector = collector(MockFs::reference_process());
        collector.collect_snapshot().unwrap();

        // uptime, meminfo, fs
        let summary = collector.last_summary().unwrap();
        assert_eq!(summary.entries, 4);
        assert_eq!(summary.collected, 1);
        assert_eq!(summary.harmless, 3);
        assert_eq!(summary.moderate, 0);
    }

    #[test]
    fn test_collect_typical_system() {
        let mut collector = collector(MockFs::typical_system());
        let snapshot = collector.collect_snapshot().unwrap();

        let pids: Vec<_> = snapshot.pids().collect();
        assert_eq!(pids, vec![1, 1000, 1001]);
        assert!(collector.last_timing().is_some());
    }

    #[test]
    fn test_zombie_is_excluded() {
        let mut collector = collector(MockFs::with_zombie_process());
        let snapshot = collector.collect_snapshot().unwrap();

        assert!(!snapshot.contains(4000));
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn test_special_names_are_collected() {
        let mut collector = collector(MockFs::with_special_names());
        let snapshot = collector.collect_snapshot().unwrap();

        let web = snapshot.get(5000).unwrap();
        assert_eq!(web.thread_count, 20);
        // 60s of CPU over 7345.67s
        assert!((web.cpu_percent - 100.0 * 60.0 / 7345.67).abs() < 1e-9);
        assert!(snapshot.contains(5001));
    }

    #[test]
    fn test_broken_processes_are_skipped() {
        let mut collector = collector(MockFs::with_broken_processes());
        let snapshot = collector.collect_snapshot().unwrap();

        let pids: Vec<_> = snapshot.pids().collect();
        assert_eq!(pids, vec![1, 1000, 1001]);

        let summary = collector.last_summary().unwrap();
        assert_eq!(summary.moderate, 3);
        assert_eq!(summary.unexpected, 1);
    }

    #[test]
    fn test_missing_uptime_aborts() {
        let mut collector = collector(MockFs::missing_uptime());
        let err = collector.collect_snapshot().unwrap_err();
        assert!(matches!(err, CollectError::UptimeUnavailable(_)));
        assert!(collector.last_summary().is_none());
    }

    #[test]
    fn test_missing_mem_total_aborts() {
        let mut collector = collector(MockFs::missing_mem_total());
        let err = collector.collect_snapshot().unwrap_err();
        assert!(matches!(err, CollectError::MemInfoUnavailable(_)));
    }

    #[test]
    fn test_malformed_start_aborts() {
        let mut collector = collector(MockFs::with_malformed_start());
        let err = collector.collect_snapshot().unwrap_err();
        assert!(matches!(
            err,
            CollectError::NonPositiveElapsed { pid: 7000, .. }
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = collector(MockFs::with_special_names())
            .collect_snapshot()
            .unwrap();
        for workers in [2, 3, 8] {
            let snapshot = parallel(MockFs::with_special_names(), workers)
                .collect_snapshot()
                .unwrap();
            assert_eq!(snapshot, sequential, "workers = {}", workers);
        }
    }

    #[test]
    fn test_parallel_summary_adds_up() {
        let mut collector = parallel(MockFs::with_broken_processes(), 4);
        collector.collect_snapshot().unwrap();

        let summary = collector.last_summary().unwrap();
        assert_eq!(summary.collected, 3);
        assert_eq!(summary.moderate + summary.unexpected, 4);
        assert_eq!(
            summary.entries,
            summary.collected + summary.harmless + summary.moderate + summary.unexpected
        );
    }

    #[test]
    fn test_parallel_serious_failure_aborts() {
        let mut collector = parallel(MockFs::with_malformed_start(), 4);
        let err = collector.collect_snapshot().unwrap_err();
        assert!(err.is_serious());
    }

    #[test]
    fn test_serious_failure_stops_sequential_scan() {
        let fs = CountingFs::new(failure_then_healthy(200), Duration::ZERO);
        let stat_reads = Arc::clone(&fs.stat_reads);
        let mut collector =
            Collector::new(fs, "/proc").with_calculator(MetricCalculator::new(100, 4096));

        let err = collector.collect_snapshot().unwrap_err();
        assert!(matches!(err, CollectError::NonPositiveElapsed { pid: 10, .. }));
        assert_eq!(stat_reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parallel_cancellation_skips_pending_entries() {
        let fs = CountingFs::new(failure_then_healthy(200), Duration::from_millis(5));
        let stat_reads = Arc::clone(&fs.stat_reads);
        let config = CollectorConfig {
            workers: 4,
            ..CollectorConfig::default()
        };
        let mut collector =
            Collector::with_config(fs, &config).with_calculator(MetricCalculator::new(100, 4096));

        let err = collector.collect_snapshot().unwrap_err();
        assert!(matches!(err, CollectError::NonPositiveElapsed { pid: 10, .. }));
        let reads = stat_reads.load(Ordering::SeqCst);
        assert!(reads < 100, "{} of 201 stat files read after cancellation", reads);
    }

    #[test]
    fn test_pid_above_ceiling_is_skipped() {
        let mut fs = MockFs::typical_system();
        fs.add_process(
            4194305,
            "4194305 (ghost) S 1 1 1 0 -1 4194304 0 0 0 0 20 5 0 0 20 0 1 0 100000 10000000 100",
        );
        let mut collector = collector(fs);
        let snapshot = collector.collect_snapshot().unwrap();

        assert_eq!(snapshot.pids().collect::<Vec<_>>(), vec![1, 1000, 1001]);
        assert_eq!(collector.last_summary().unwrap().moderate, 1);
    }

    #[test]
    fn test_collect_and_export_writes_nothing_on_abort() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ProcessesStatus.txt");

        let mut collector = collector(MockFs::missing_uptime());
        assert!(collector.collect_and_export(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_collect_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ProcessesStatus.txt");

        let mut collector = collector(MockFs::reference_process());
        collector.collect_and_export(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Pid: 666 cpu: 0.19% memory: 0.08% threads: 3 time: 1:34:2.280\n"
        );
    }

    #[test]
    fn test_export_into_missing_directory_is_serious() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");

        let mut collector = collector(MockFs::reference_process());
        let err = collector.collect_and_export(&path).unwrap_err();
        assert!(matches!(err, CollectError::Export { .. }));
        assert!(err.is_serious());
    }
}
