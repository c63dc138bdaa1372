//! Internal events for floe metrics emission.
//!
//! Each struct is one measurable occurrence in a watch run and knows which
//! Prometheus series it updates. Every event carries a `target` label naming
//! the stream, so one process watching several streams stays observable per
//! stream.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    fn emit(self);
}

/// Kind of change-stream record forwarded to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    DataChange,
    Heartbeat,
    ChildPartitions,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::DataChange => "data_change",
            RecordKind::Heartbeat => "heartbeat",
            RecordKind::ChildPartitions => "child_partitions",
        }
    }
}

/// A record was handed to the sink.
pub struct RecordEmitted {
    pub kind: RecordKind,
    pub target: String,
}

impl InternalEvent for RecordEmitted {
    fn emit(self) {
        trace!(kind = self.kind.as_str(), target = %self.target, "Record emitted");
        counter!(
            "floe_records_emitted_total",
            "kind" => self.kind.as_str(),
            "target" => self.target
        )
        .increment(1);
    }
}

/// A partition task started querying.
pub struct PartitionStarted {
    pub target: String,
}

impl InternalEvent for PartitionStarted {
    fn emit(self) {
        trace!(target = %self.target, "Partition started");
        counter!("floe_partitions_started_total", "target" => self.target).increment(1);
    }
}

/// How a partition task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStatus {
    Exhausted,
    Failed,
    Cancelled,
}

impl PartitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionStatus::Exhausted => "exhausted",
            PartitionStatus::Failed => "failed",
            PartitionStatus::Cancelled => "cancelled",
        }
    }
}

/// A partition task reached a terminal state.
pub struct PartitionCompleted {
    pub status: PartitionStatus,
    pub target: String,
}

impl InternalEvent for PartitionCompleted {
    fn emit(self) {
        trace!(status = self.status.as_str(), target = %self.target, "Partition completed");
        counter!(
            "floe_partitions_completed_total",
            "status" => self.status.as_str(),
            "target" => self.target
        )
        .increment(1);
    }
}

/// Current number of partition tasks in flight for a stream.
pub struct ActivePartitions {
    pub count: usize,
    pub target: String,
}

impl InternalEvent for ActivePartitions {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Active partitions");
        gauge!("floe_active_partitions", "target" => self.target).set(self.count as f64);
    }
}

/// Wall time a partition spent between opening its query and exhaustion.
pub struct PartitionQueryDuration {
    pub duration: Duration,
    pub target: String,
}

impl InternalEvent for PartitionQueryDuration {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis() as u64, target = %self.target, "Partition query duration");
        histogram!("floe_partition_query_duration_seconds", "target" => self.target)
            .record(self.duration.as_secs_f64());
    }
}

/// Opening a partition query failed and will be retried.
pub struct QueryRetried {
    pub attempt: u32,
    pub target: String,
}

impl InternalEvent for QueryRetried {
    fn emit(self) {
        trace!(attempt = self.attempt, target = %self.target, "Query retried");
        counter!("floe_query_retries_total", "target" => self.target).increment(1);
    }
}
