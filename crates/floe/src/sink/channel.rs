//! In-process sink backed by a bounded channel.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::traits::RecordSink;
use crate::error::SinkError;
use crate::partition::PartitionToken;
use crate::record::ChangeStreamRecord;

/// A record together with the partition that produced it.
pub type Delivery = (PartitionToken, ChangeStreamRecord);

/// Forwards records to a bounded channel.
///
/// A full channel suspends the producing partition task until the consumer
/// catches up. A dropped receiver fails the producing task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<Delivery>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Delivery>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl RecordSink for ChannelSink {
    async fn accept(
        &self,
        origin: &PartitionToken,
        record: &ChangeStreamRecord,
    ) -> Result<(), SinkError> {
        self.sender
            .send((origin.clone(), record.clone()))
            .await
            .map_err(|_| SinkError::ChannelClosed)
    }
}
