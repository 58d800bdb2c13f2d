//! Snapshot of every live process at one instant.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};

use super::process::ProcessMetrics;

/// Kernel process id. Valid ids are `1..=PID_MAX`; 0 is the idle task.
pub type ProcessId = u32;

/// Practical ceiling for process ids (`/proc/sys/kernel/pid_max` upper bound on 64-bit).
pub const PID_MAX: ProcessId = 4_194_304;

/// Mapping from process id to its metrics, built once per collection run.
///
/// Iteration is in ascending pid order, so exports of the same snapshot are
/// byte-identical and pagination is stable.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Snapshot {
    processes: BTreeMap<ProcessId, ProcessMetrics>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts metrics for `pid`, keeping an existing entry if one is present.
    ///
    /// Returns `false` when the pid was already recorded.
    pub fn insert(&mut self, pid: ProcessId, metrics: ProcessMetrics) -> bool {
        match self.processes.entry(pid) {
            Entry::Vacant(slot) => {
                slot.insert(metrics);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Moves every entry of `other` into `self`.
    pub fn merge(&mut self, other: Snapshot) {
        for (pid, metrics) in other.processes {
            self.insert(pid, metrics);
        }
    }

    pub fn get(&self, pid: ProcessId) -> Option<&ProcessMetrics> {
        self.processes.get(&pid)
    }

    pub fn contains(&self, pid: ProcessId) -> bool {
        self.processes.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProcessId, &ProcessMetrics)> {
        self.processes.iter().map(|(pid, m)| (*pid, m))
    }

    pub fn pids(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.processes.keys().copied()
    }
}

impl FromIterator<(ProcessId, ProcessMetrics)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (ProcessId, ProcessMetrics)>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for (pid, metrics) in iter {
            snapshot.insert(pid, metrics);
        }
        snapshot
    }
}
