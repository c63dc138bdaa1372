//! Process-wide options shared by every configured component.

use serde::{Deserialize, Serialize};

/// Options that apply across all components running in the process.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Upper bound on partition tasks holding an open query at once, across
    /// all streams.
    ///
    /// `None` (the default) leaves the partition tree unbounded: every
    /// announced child partition starts querying immediately.
    #[serde(default)]
    pub max_concurrent_partitions: Option<usize>,
}

impl GlobalConfig {
    pub fn with_partition_limit(limit: usize) -> Self {
        Self {
            max_concurrent_partitions: Some(limit),
        }
    }

    /// Merge another global section into this one (last explicit value wins).
    pub fn merge_from(&mut self, other: Self) {
        if other.max_concurrent_partitions.is_some() {
            self.max_concurrent_partitions = other.max_concurrent_partitions;
        }
    }
}
