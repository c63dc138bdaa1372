//! Partition identity.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{ChildPartition, ChildPartitionsRecord};

/// Opaque identifier of a change-stream partition.
///
/// The empty token stands for the synthetic root partition, which is queried
/// without a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionToken(String);

impl PartitionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The token to pass to the query, `None` for the root partition.
    pub fn query_token(&self) -> Option<&str> {
        (!self.is_root()).then_some(self.0.as_str())
    }
}

impl fmt::Display for PartitionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for PartitionToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for PartitionToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// A partition to watch, owned by the task that watches it.
///
/// The end of the watch window is shared by the whole tree and lives with the
/// watcher, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub token: PartitionToken,
    pub parent_tokens: BTreeSet<PartitionToken>,
    pub start_timestamp: DateTime<Utc>,
}

impl Partition {
    /// The root partition of a watch run starting at `start`.
    pub fn root(start: DateTime<Utc>) -> Self {
        Self {
            token: PartitionToken::root(),
            parent_tokens: BTreeSet::new(),
            start_timestamp: start,
        }
    }

    pub fn new(
        token: impl Into<PartitionToken>,
        parent_tokens: impl IntoIterator<Item = PartitionToken>,
        start_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            parent_tokens: parent_tokens.into_iter().collect(),
            start_timestamp,
        }
    }

    /// A partition announced by `record`. It starts where the record says the
    /// split or merge took effect.
    pub fn from_child(record: &ChildPartitionsRecord, child: &ChildPartition) -> Self {
        Self::new(
            child.token.clone(),
            child.parent_partition_tokens.iter().cloned(),
            record.start_timestamp,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_token() {
        let root = PartitionToken::root();
        assert!(root.is_root());
        assert_eq!(root.query_token(), None);
        assert_eq!(root.to_string(), "<root>");
    }

    #[test]
    fn test_child_token() {
        let token = PartitionToken::from("A");
        assert!(!token.is_root());
        assert_eq!(token.query_token(), Some("A"));
        assert_eq!(token.to_string(), "A");
    }

    #[test]
    fn test_partition_parents_deduplicated() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let partition = Partition::new(
            "C",
            vec![PartitionToken::from("A"), PartitionToken::from("B"), PartitionToken::from("A")],
            start,
        );
        assert_eq!(partition.parent_tokens.len(), 2);
        assert_eq!(partition.start_timestamp, start);
    }

    #[test]
    fn test_merge_child_keeps_every_parent() {
        let start = DateTime::from_timestamp(1_700_000_060, 0).unwrap();
        let child = ChildPartition {
            token: PartitionToken::from("AB"),
            parent_partition_tokens: vec![PartitionToken::from("A"), PartitionToken::from("B")],
        };
        let record = ChildPartitionsRecord {
            start_timestamp: start,
            record_sequence: "00000002".to_string(),
            child_partitions: vec![child.clone()],
        };

        let partition = Partition::from_child(&record, &child);
        assert_eq!(partition.token, PartitionToken::from("AB"));
        assert_eq!(
            partition.parent_tokens,
            BTreeSet::from([PartitionToken::from("A"), PartitionToken::from("B")])
        );
        assert_eq!(partition.start_timestamp, start);
    }

    #[test]
    fn test_token_serializes_as_string() {
        let json = serde_json::to_string(&PartitionToken::from("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
        assert_eq!(serde_json::to_string(&PartitionToken::root()).unwrap(), "\"\"");
    }
}
