//! Stream pipelines.
//!
//! Each configured stream becomes a [`StreamPipeline`]: it opens the stream's
//! source and sink, then runs the recursive partition watcher over the
//! stream's time window. Several pipelines run side by side under the shared
//! runner with one shutdown signal and an optional shared partition cap.

mod stats;
mod watcher;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use snafu::ResultExt;
use tracing::info;

use floe_core::{Pipeline, PipelineContext};

use crate::config::{SinkConfig, SourceConfig, StreamConfig, StreamKey, WatchWindow};
use crate::error::{OpenSinkSnafu, OpenSourceSnafu, PipelineError};
use crate::sink::{NdjsonSink, RecordSink};
use crate::source::{CapturedSource, ChangeStreamSource};

pub use stats::WatchStats;
pub use watcher::{WatchOptions, WatchReport, watch_stream};

/// A floe pipeline unit watching one change stream.
pub struct StreamPipeline {
    pub key: StreamKey,
    pub config: StreamConfig,
    pub window: WatchWindow,
    pub context: PipelineContext,
}

impl StreamPipeline {
    /// Create a pipeline, resolving an open-ended window against `now`.
    pub fn new(
        key: StreamKey,
        config: StreamConfig,
        now: DateTime<Utc>,
        context: PipelineContext,
    ) -> Self {
        let window = config.window(now);
        Self {
            key,
            config,
            window,
            context,
        }
    }

    async fn open_source(&self) -> Result<Arc<dyn ChangeStreamSource>, PipelineError> {
        match &self.config.source {
            SourceConfig::Captured { path } => {
                let source = CapturedSource::open(path).await.context(OpenSourceSnafu)?;
                Ok(Arc::new(source))
            }
        }
    }

    async fn open_sink(&self) -> Result<Arc<dyn RecordSink>, PipelineError> {
        match &self.config.sink {
            SinkConfig::Stdout => Ok(NdjsonSink::shared_stdout()),
            SinkConfig::File { path } => {
                let sink = NdjsonSink::create(path).await.context(OpenSinkSnafu)?;
                Ok(Arc::new(sink))
            }
        }
    }

    /// Open the source and sink, then watch the stream's window.
    pub async fn execute(self) -> Result<WatchReport, PipelineError> {
        let shutdown = self.context.shutdown.clone();

        let (source, sink) = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!(target = %self.key, "Shutdown requested during initialization");
                return Err(PipelineError::Shutdown);
            }

            opened = async { Ok::<_, PipelineError>((self.open_source().await?, self.open_sink().await?)) } => opened?,
        };

        let mut options = WatchOptions::new(self.key.id(), self.window).with_retry(self.config.retry.clone());
        options.heartbeat_interval = self.config.heartbeat_interval();
        options.partition_limit = self.context.partition_limit.clone();

        watch_stream(options, source, sink, &shutdown).await
    }
}

impl Pipeline for StreamPipeline {
    type Key = StreamKey;
    type Error = PipelineError;

    fn key(&self) -> &Self::Key {
        &self.key
    }

    async fn run(self) -> Result<(), Self::Error> {
        self.execute().await.map(|_| ())
    }
}
