//! Newline-delimited JSON output.
//!
//! Each record becomes one line tagged with the partition it came from:
//!
//! ```text
//! {"partition_token":"A","heartbeat":{"timestamp":"2024-05-01T00:00:00Z"}}
//! ```

use std::path::Path;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use serde::Serialize;
use snafu::prelude::*;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter, Stdout};
use tokio::sync::Mutex;

use super::traits::RecordSink;
use crate::error::{CreateFileSnafu, SerializeSnafu, SinkError, WriteSnafu};
use crate::partition::PartitionToken;
use crate::record::ChangeStreamRecord;

static STDOUT: LazyLock<Arc<NdjsonSink<Stdout>>> =
    LazyLock::new(|| Arc::new(NdjsonSink::new(tokio::io::stdout())));

#[derive(Serialize)]
struct Line<'a> {
    partition_token: &'a PartitionToken,
    #[serde(flatten)]
    record: &'a ChangeStreamRecord,
}

/// Writes one JSON line per record. Lines from concurrent partitions never
/// interleave.
pub struct NdjsonSink<W> {
    writer: Mutex<W>,
}

impl<W> NdjsonSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl NdjsonSink<Stdout> {
    /// The process-wide stdout sink. Every stream writing to stdout shares it
    /// so lines from different streams never interleave.
    pub fn shared_stdout() -> Arc<Self> {
        Arc::clone(&STDOUT)
    }
}

impl NdjsonSink<BufWriter<File>> {
    /// Create (or truncate) `path` and write to it.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let file = File::create(path).await.context(CreateFileSnafu {
            path: path.display().to_string(),
        })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

/// Render a record as it appears in NDJSON output, without the newline.
fn to_line(origin: &PartitionToken, record: &ChangeStreamRecord) -> Result<Vec<u8>, SinkError> {
    serde_json::to_vec(&Line {
        partition_token: origin,
        record,
    })
    .context(SerializeSnafu)
}

#[async_trait]
impl<W> RecordSink for NdjsonSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn accept(
        &self,
        origin: &PartitionToken,
        record: &ChangeStreamRecord,
    ) -> Result<(), SinkError> {
        let mut line = to_line(origin, record)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await.context(WriteSnafu)
    }

    async fn flush(&self) -> Result<(), SinkError> {
        self.writer.lock().await.flush().await.context(WriteSnafu)
    }
}
