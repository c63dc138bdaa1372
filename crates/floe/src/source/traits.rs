//! Query source abstraction.
//!
//! The database client that runs the change-stream query lives behind
//! [`ChangeStreamSource`], so the watcher can be driven by a live client, a
//! captured replay or a test double.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::decode::Row;
use crate::error::SourceError;
use crate::partition::PartitionToken;

/// Rows of one partition query, in arrival order. Ends with `None`.
pub type RowStream = BoxStream<'static, Result<Row, SourceError>>;

/// Default heartbeat interval requested from the database.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(300_000);

/// Parameters of one change-stream partition query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionQuery {
    /// The partition to read; the root partition is queried without a token.
    pub token: PartitionToken,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    pub heartbeat_interval: Duration,
}

impl PartitionQuery {
    /// The token parameter as sent to the database, `None` for the root.
    pub fn partition_token(&self) -> Option<&str> {
        self.token.query_token()
    }
}

/// Something that can run a change-stream query for one partition.
///
/// Shared read-only by every partition task of a stream, so implementations
/// must tolerate concurrent queries.
#[async_trait]
pub trait ChangeStreamSource: Send + Sync {
    /// Open the query. Failing here is the only point where a query may be
    /// retried; errors yielded by the returned stream are final.
    async fn query(&self, query: PartitionQuery) -> Result<RowStream, SourceError>;
}
