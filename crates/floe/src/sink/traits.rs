//! Record sink abstraction.

use async_trait::async_trait;

use crate::error::SinkError;
use crate::partition::PartitionToken;
use crate::record::ChangeStreamRecord;

/// Destination for every record a watch run produces.
///
/// Called concurrently by all partition tasks of a stream. Implementations
/// serialize their own writes, keep each call's blocking bounded, and return
/// errors instead of dropping records; an error fails the calling partition.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Deliver one record produced by partition `origin`.
    async fn accept(
        &self,
        origin: &PartitionToken,
        record: &ChangeStreamRecord,
    ) -> Result<(), SinkError>;

    /// Push buffered output downstream. Called once when the run ends.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
