//! Change-stream record model.
//!
//! Field names follow the change-stream columns. Values the watcher never
//! interprets (column types, mod keys and values) stay as raw JSON.

use chrono::{DateTime, Utc};
use floe_core::metrics::events::RecordKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decode::timestamp::{deserialize_int64, deserialize_timestamp};
use crate::partition::PartitionToken;

/// One record produced by a partition query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStreamRecord {
    DataChange(DataChangeRecord),
    Heartbeat(HeartbeatRecord),
    ChildPartitions(ChildPartitionsRecord),
}

impl ChangeStreamRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::DataChange(_) => RecordKind::DataChange,
            Self::Heartbeat(_) => RecordKind::Heartbeat,
            Self::ChildPartitions(_) => RecordKind::ChildPartitions,
        }
    }

    pub fn as_child_partitions(&self) -> Option<&ChildPartitionsRecord> {
        match self {
            Self::ChildPartitions(record) => Some(record),
            _ => None,
        }
    }
}

/// Kind of row mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModType {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnType {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: Value,
    pub is_primary_key: bool,
    #[serde(deserialize_with = "deserialize_int64")]
    pub ordinal_position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mod {
    pub keys: Value,
    #[serde(default)]
    pub new_values: Value,
    #[serde(default)]
    pub old_values: Value,
}

/// A committed row change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataChangeRecord {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub commit_timestamp: DateTime<Utc>,
    pub record_sequence: String,
    pub server_transaction_id: String,
    pub is_last_record_in_transaction_in_partition: bool,
    pub table_name: String,
    pub column_types: Vec<ColumnType>,
    pub mods: Vec<Mod>,
    pub mod_type: ModType,
    pub value_capture_type: String,
    #[serde(deserialize_with = "deserialize_int64")]
    pub number_of_records_in_transaction: i64,
    #[serde(deserialize_with = "deserialize_int64")]
    pub number_of_partitions_in_transaction: i64,
}

impl DataChangeRecord {
    /// Records of one transaction within a partition sort by this key.
    pub fn ordering_key(&self) -> (DateTime<Utc>, &str) {
        (self.commit_timestamp, &self.record_sequence)
    }
}

/// Liveness signal: the partition has no changes up to `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildPartition {
    pub token: PartitionToken,
    #[serde(default)]
    pub parent_partition_tokens: Vec<PartitionToken>,
}

/// Announces that the key range split or merged into new partitions that
/// start at `start_timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildPartitionsRecord {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub start_timestamp: DateTime<Utc>,
    pub record_sequence: String,
    pub child_partitions: Vec<ChildPartition>,
}
