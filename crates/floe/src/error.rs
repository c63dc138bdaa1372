//! Error types for the floe change-stream watcher.

use snafu::prelude::*;

use floe_core::TaskError;

use crate::partition::PartitionToken;

// Re-export common errors
pub use floe_core::error::ConfigError;

/// Errors that can occur while decoding a `ChangeRecord` row.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DecodeError {
    /// The column is neither an envelope array nor a single envelope.
    #[snafu(display("ChangeRecord column must be an array of envelopes, found {found}"))]
    ColumnShape { found: String },

    /// An envelope did not match the record schema.
    #[snafu(display("Malformed envelope at index {index}: {source}"))]
    Envelope {
        index: usize,
        source: serde_json::Error,
    },

    /// An envelope had zero or several populated record lists.
    #[snafu(display(
        "Envelope at index {index} has {populated} populated record lists, expected exactly one"
    ))]
    AmbiguousEnvelope { index: usize, populated: usize },

    /// A raw row was not valid JSON.
    #[snafu(display("ChangeRecord column is not valid JSON: {source}"))]
    RowJson { source: serde_json::Error },
}

/// Errors raised by a change-stream query source.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// The database rejected the query.
    #[snafu(display("Query for partition {partition} rejected: {message}"))]
    QueryRejected {
        partition: PartitionToken,
        message: String,
    },

    /// The connection failed while the stream was open.
    #[snafu(display("Connection lost: {message}"))]
    Connection { message: String },

    /// Failed to read a captured change-stream file.
    #[snafu(display("Failed to read capture file {path}: {source}"))]
    ReadCapture {
        path: String,
        source: std::io::Error,
    },

    /// A captured line is not a valid row.
    #[snafu(display("Invalid row on line {line} of {path}: {source}"))]
    ParseCapture {
        path: String,
        line: usize,
        source: serde_json::Error,
    },
}

/// Errors raised by a record sink.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// Failed to serialize a record.
    #[snafu(display("Failed to serialize record: {source}"))]
    Serialize { source: serde_json::Error },

    /// Failed to write or flush output.
    #[snafu(display("Failed to write output: {source}"))]
    Write { source: std::io::Error },

    /// Failed to create the output file.
    #[snafu(display("Failed to create output file {path}: {source}"))]
    CreateFile {
        path: String,
        source: std::io::Error,
    },

    /// The receiving side of a channel sink was dropped.
    #[snafu(display("Record channel closed"))]
    ChannelClosed,
}

/// Why a partition task failed. Carries the partition it happened in.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WatchError {
    #[snafu(display("Partition {partition}: source error: {source}"))]
    Source {
        partition: PartitionToken,
        source: SourceError,
    },

    #[snafu(display("Partition {partition}: decode error: {source}"))]
    Decode {
        partition: PartitionToken,
        source: DecodeError,
    },

    #[snafu(display("Partition {partition}: sink error: {source}"))]
    Sink {
        partition: PartitionToken,
        source: SinkError,
    },
}

impl WatchError {
    pub fn partition(&self) -> &PartitionToken {
        match self {
            Self::Source { partition, .. }
            | Self::Decode { partition, .. }
            | Self::Sink { partition, .. } => partition,
        }
    }
}

/// Top-level errors of one stream run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// The query source could not be created.
    #[snafu(display("Failed to open source: {source}"))]
    OpenSource { source: SourceError },

    /// The sink could not be created.
    #[snafu(display("Failed to open sink: {source}"))]
    OpenSink { source: SinkError },

    /// A partition task failed; this is the first failure of the tree.
    #[snafu(display("Watch failed: {source}"))]
    Watch { source: TaskError },

    /// Shutdown was requested before the watch window ended.
    #[snafu(display("Watch stopped by shutdown"))]
    Shutdown,

    /// The sink could not be flushed after the run.
    #[snafu(display("Failed to flush sink: {source}"))]
    Flush { source: SinkError },
}

impl PipelineError {
    /// The partition-level cause of a `Watch` failure, if there is one.
    pub fn watch_error(&self) -> Option<&WatchError> {
        match self {
            Self::Watch { source } => source.downcast_ref::<WatchError>(),
            _ => None,
        }
    }
}
