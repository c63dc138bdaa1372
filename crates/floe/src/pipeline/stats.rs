//! Per-run counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::record::ChangeStreamRecord;

/// Totals for one watch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchStats {
    /// Partitions whose query was exhausted (including empty windows).
    pub partitions_completed: u64,
    pub data_change_records: u64,
    pub heartbeat_records: u64,
    pub child_partition_records: u64,
    /// Child partition tasks submitted to the group.
    pub children_spawned: u64,
}

impl WatchStats {
    pub fn records(&self) -> u64 {
        self.data_change_records + self.heartbeat_records + self.child_partition_records
    }
}

impl fmt::Display for WatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} partitions, {} data changes, {} heartbeats, {} child partition records",
            self.partitions_completed,
            self.data_change_records,
            self.heartbeat_records,
            self.child_partition_records
        )
    }
}

/// Counters shared by every partition task of a run.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    partitions_completed: AtomicU64,
    data_change_records: AtomicU64,
    heartbeat_records: AtomicU64,
    child_partition_records: AtomicU64,
    children_spawned: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn record(&self, record: &ChangeStreamRecord) {
        let counter = match record {
            ChangeStreamRecord::DataChange(_) => &self.data_change_records,
            ChangeStreamRecord::Heartbeat(_) => &self.heartbeat_records,
            ChangeStreamRecord::ChildPartitions(_) => &self.child_partition_records,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn partition_completed(&self) {
        self.partitions_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn child_spawned(&self) {
        self.children_spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> WatchStats {
        WatchStats {
            partitions_completed: self.partitions_completed.load(Ordering::Relaxed),
            data_change_records: self.data_change_records.load(Ordering::Relaxed),
            heartbeat_records: self.heartbeat_records.load(Ordering::Relaxed),
            child_partition_records: self.child_partition_records.load(Ordering::Relaxed),
            children_spawned: self.children_spawned.load(Ordering::Relaxed),
        }
    }
}
