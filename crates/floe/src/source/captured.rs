//! Replay of recorded change-stream rows.
//!
//! A capture file is NDJSON with one row per line:
//!
//! ```text
//! {"partition_token": "", "change_record": [{"child_partitions_record": [...]}]}
//! {"partition_token": "A", "change_record": [{"data_change_record": [...]}]}
//! ```
//!
//! The empty token is the root partition. Rows are replayed per token in file
//! order; a token that never appears in the file yields an empty stream.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use snafu::prelude::*;
use tracing::debug;

use super::traits::{ChangeStreamSource, PartitionQuery, RowStream};
use crate::decode::Row;
use crate::error::{ParseCaptureSnafu, ReadCaptureSnafu, SourceError};
use crate::partition::PartitionToken;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CapturedLine {
    #[serde(default)]
    partition_token: PartitionToken,
    change_record: Value,
}

/// A [`ChangeStreamSource`] that replays rows loaded from a capture.
#[derive(Debug, Default)]
pub struct CapturedSource {
    rows: HashMap<PartitionToken, Arc<Vec<Row>>>,
    queries: Mutex<Vec<PartitionQuery>>,
}

impl CapturedSource {
    /// Load a capture file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let contents = tokio::fs::read_to_string(path)
            .await
            .context(ReadCaptureSnafu { path: label.clone() })?;
        let source = Self::parse(&label, &contents)?;
        debug!(
            path = %label,
            partitions = source.rows.len(),
            "Loaded captured change stream"
        );
        Ok(source)
    }

    /// Parse capture contents. `label` names the capture in errors.
    pub fn parse(label: &str, contents: &str) -> Result<Self, SourceError> {
        let mut rows: HashMap<PartitionToken, Vec<Row>> = HashMap::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let captured: CapturedLine = serde_json::from_str(line).context(ParseCaptureSnafu {
                path: label,
                line: index + 1,
            })?;
            rows.entry(captured.partition_token)
                .or_default()
                .push(Row::new(captured.change_record));
        }
        Ok(Self::from_rows(rows))
    }

    /// Build a source from rows already grouped by partition.
    pub fn from_rows(rows: impl IntoIterator<Item = (PartitionToken, Vec<Row>)>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|(token, rows)| (token, Arc::new(rows)))
                .collect(),
            queries: Mutex::new(Vec::new()),
        }
    }

    #[cfg(test)]
    fn row_count(&self, token: &PartitionToken) -> usize {
        self.rows.get(token).map_or(0, |rows| rows.len())
    }

    /// Every query issued against this source, in order.
    pub fn queries(&self) -> Vec<PartitionQuery> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ChangeStreamSource for CapturedSource {
    async fn query(&self, query: PartitionQuery) -> Result<RowStream, SourceError> {
        let rows = self.rows.get(&query.token).cloned().unwrap_or_default();
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query);

        let replay = (0..rows.len()).map(move |i| Ok(rows[i].clone()));
        Ok(futures::stream::iter(replay).boxed())
    }
}
