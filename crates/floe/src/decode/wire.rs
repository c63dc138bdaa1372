//! Wire envelope of the `ChangeRecord` column.

use serde::Deserialize;

use crate::record::{
    ChangeStreamRecord, ChildPartitionsRecord, DataChangeRecord, HeartbeatRecord,
};

/// One element of the `ChangeRecord` array. Exactly one list is populated.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    data_change_record: Option<Vec<DataChangeRecord>>,
    #[serde(default)]
    heartbeat_record: Option<Vec<HeartbeatRecord>>,
    #[serde(default)]
    child_partitions_record: Option<Vec<ChildPartitionsRecord>>,
}

impl Envelope {
    /// Number of non-empty record lists.
    pub(crate) fn populated(&self) -> usize {
        fn filled<T>(list: &Option<Vec<T>>) -> bool {
            list.as_ref().is_some_and(|records| !records.is_empty())
        }
        [
            filled(&self.data_change_record),
            filled(&self.heartbeat_record),
            filled(&self.child_partitions_record),
        ]
        .into_iter()
        .filter(|populated| *populated)
        .count()
    }

    /// Flatten into records, keeping the order of the populated list.
    pub(crate) fn into_records(self) -> Vec<ChangeStreamRecord> {
        let data_changes = self
            .data_change_record
            .unwrap_or_default()
            .into_iter()
            .map(ChangeStreamRecord::DataChange);
        let heartbeats = self
            .heartbeat_record
            .unwrap_or_default()
            .into_iter()
            .map(ChangeStreamRecord::Heartbeat);
        let children = self
            .child_partitions_record
            .unwrap_or_default()
            .into_iter()
            .map(ChangeStreamRecord::ChildPartitions);
        data_changes.chain(heartbeats).chain(children).collect()
    }
}
