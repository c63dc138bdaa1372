//! Floe: change-stream partition watcher.
//!
//! This crate handles:
//! - Decoding `ChangeRecord` rows into data change, heartbeat and
//!   child-partition records
//! - Watching a dynamically growing tree of partitions, one task per
//!   partition, until the end of a time window
//! - Forwarding every record to a sink in per-partition arrival order
//! - Running several independently configured streams in one process

pub mod config;
pub mod decode;
pub mod error;
pub mod partition;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod source;

// Re-export commonly used items
pub use config::{Config, StreamConfig, StreamKey, WatchWindow};
pub use decode::{Row, decode_row};
pub use error::{DecodeError, PipelineError, SinkError, SourceError, WatchError};
pub use partition::{Partition, PartitionToken};
pub use pipeline::{StreamPipeline, WatchOptions, WatchReport, WatchStats, watch_stream};
pub use record::{
    ChangeStreamRecord, ChildPartition, ChildPartitionsRecord, ColumnType, DataChangeRecord,
    HeartbeatRecord, Mod, ModType,
};
pub use sink::{ChannelSink, NdjsonSink, RecordSink};
pub use source::{CapturedSource, ChangeStreamSource, PartitionQuery, RowStream};

// Re-export from floe-core
pub use floe_core::{Application, RetryConfig, init_tracing};
