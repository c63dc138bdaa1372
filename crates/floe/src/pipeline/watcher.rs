//! Recursive partition watching.
//!
//! A watch run starts one task for the root partition. Every task queries its
//! partition, forwards each decoded record to the sink in arrival order and,
//! when the stream announces child partitions, submits one new task per child
//! into the same task group. The run ends when every task in the tree has
//! finished, or with the first failure, which cancels the rest of the tree.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use snafu::ResultExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use floe_core::emit;
use floe_core::metrics::events::{
    ActivePartitions, PartitionCompleted, PartitionQueryDuration, PartitionStarted,
    PartitionStatus, QueryRetried, RecordEmitted,
};
use floe_core::topology::BoxFuture;
use floe_core::{GroupSummary, RetryConfig, Task, TaskError, TaskGroup, TaskOutput, TaskResult};

use super::stats::{StatsRecorder, WatchStats};
use crate::config::WatchWindow;
use crate::decode::decode_row;
use crate::error::{
    DecodeSnafu, FlushSnafu, PipelineError, SinkSnafu, SourceSnafu, WatchError,
};
use crate::partition::{Partition, PartitionToken};
use crate::record::{ChangeStreamRecord, ChildPartitionsRecord};
use crate::sink::RecordSink;
use crate::source::{ChangeStreamSource, DEFAULT_HEARTBEAT_INTERVAL, PartitionQuery, RowStream};

/// Parameters of one watch run.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Stream name used in logs and metric labels.
    pub stream: String,
    pub window: WatchWindow,
    pub heartbeat_interval: Duration,
    pub retry: RetryConfig,
    /// Shared cap on partitions holding an open query.
    pub partition_limit: Option<Arc<Semaphore>>,
}

impl WatchOptions {
    pub fn new(stream: impl Into<String>, window: WatchWindow) -> Self {
        Self {
            stream: stream.into(),
            window,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            retry: RetryConfig::default(),
            partition_limit: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_partition_limit(mut self, limit: Arc<Semaphore>) -> Self {
        self.partition_limit = Some(limit);
        self
    }
}

/// Outcome of a completed watch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchReport {
    pub summary: GroupSummary,
    pub stats: WatchStats,
}

/// Watch a change stream over `options.window` until every partition in the
/// tree is exhausted.
///
/// Returns the first partition failure, or `PipelineError::Shutdown` if
/// `shutdown` fired first. The sink is flushed in every case.
pub async fn watch_stream(
    options: WatchOptions,
    source: Arc<dyn ChangeStreamSource>,
    sink: Arc<dyn RecordSink>,
    shutdown: &CancellationToken,
) -> Result<WatchReport, PipelineError> {
    let WatchOptions {
        stream,
        window,
        heartbeat_interval,
        retry,
        partition_limit,
    } = options;

    let group = TaskGroup::new(stream.clone(), shutdown.child_token());
    let watcher = Arc::new(PartitionWatcher {
        stream: stream.clone(),
        source,
        sink,
        end_timestamp: window.end,
        heartbeat_interval,
        retry,
        partition_limit,
        group: group.clone(),
        stats: StatsRecorder::default(),
    });

    info!(
        target = %stream,
        start = %window.start,
        end = %window.end,
        "Watching change stream"
    );

    if !watcher.spawn(Partition::root(window.start)) {
        info!(target = %stream, "Shutdown requested before the root partition started");
        return Err(PipelineError::Shutdown);
    }

    let outcome = group.wait().await;
    let flushed = watcher.sink.flush().await;
    let stats = watcher.stats.snapshot();

    match outcome {
        Ok(summary) => {
            flushed.context(FlushSnafu)?;
            info!(
                target = %stream,
                partitions = summary.succeeded,
                records = stats.records(),
                "Watch window complete: {}", stats
            );
            Ok(WatchReport { summary, stats })
        }
        Err(source) => {
            if let Err(e) = flushed {
                warn!(target = %stream, error = %e, "Failed to flush sink after watch ended");
            }
            if source.is_cancelled() {
                info!(target = %stream, "Watch stopped by shutdown: {}", stats);
                Err(PipelineError::Shutdown)
            } else {
                Err(PipelineError::Watch { source })
            }
        }
    }
}

struct PartitionWatcher {
    stream: String,
    source: Arc<dyn ChangeStreamSource>,
    sink: Arc<dyn RecordSink>,
    end_timestamp: DateTime<Utc>,
    heartbeat_interval: Duration,
    retry: RetryConfig,
    partition_limit: Option<Arc<Semaphore>>,
    group: TaskGroup,
    stats: StatsRecorder,
}

impl PartitionWatcher {
    /// Submit a task for `partition`. Returns false if the group refused it.
    fn spawn(self: &Arc<Self>, partition: Partition) -> bool {
        let task = Task {
            key: partition.token.clone(),
            future: Arc::clone(self).watch(partition),
            typetag: "partition",
        };
        let submitted = self.group.submit(task);
        if submitted {
            emit!(ActivePartitions {
                count: self.group.active(),
                target: self.stream.clone(),
            });
        }
        submitted
    }

    fn watch(self: Arc<Self>, partition: Partition) -> BoxFuture<'static> {
        Box::pin(async move {
            let token = partition.token.clone();
            let started = Instant::now();
            let result = self.run(partition).await;

            let status = match &result {
                Ok(_) => {
                    self.stats.partition_completed();
                    PartitionStatus::Exhausted
                }
                Err(TaskError::Cancelled) => PartitionStatus::Cancelled,
                Err(_) => PartitionStatus::Failed,
            };
            debug!(
                target = %self.stream,
                partition = %token,
                status = status.as_str(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Partition finished"
            );
            emit!(PartitionCompleted {
                status,
                target: self.stream.clone(),
            });
            // The group counts this task as active until the future returns.
            emit!(ActivePartitions {
                count: self.group.active().saturating_sub(1),
                target: self.stream.clone(),
            });
            result
        })
    }

    async fn run(self: &Arc<Self>, partition: Partition) -> TaskResult {
        let Partition {
            token,
            parent_tokens,
            start_timestamp,
        } = partition;

        if start_timestamp >= self.end_timestamp {
            debug!(
                target = %self.stream,
                partition = %token,
                start = %start_timestamp,
                "Partition starts at or after the window end, nothing to read"
            );
            return Ok(TaskOutput::with_message("empty window"));
        }

        let _permit = self.acquire_permit().await?;

        let query = PartitionQuery {
            token: token.clone(),
            start_timestamp,
            end_timestamp: self.end_timestamp,
            heartbeat_interval: self.heartbeat_interval,
        };
        let mut rows = self.open(query).await?;

        debug!(
            target = %self.stream,
            partition = %token,
            parents = parent_tokens.len(),
            start = %start_timestamp,
            "Partition query opened"
        );
        emit!(PartitionStarted {
            target: self.stream.clone(),
        });

        let cancel = self.group.cancellation();
        let opened = Instant::now();
        let mut emitted = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TaskError::Cancelled),
                next = rows.next() => next,
            };
            let Some(row) = next else {
                break;
            };

            let row = row
                .context(SourceSnafu {
                    partition: token.clone(),
                })
                .map_err(TaskError::failed)?;
            let records = decode_row(&row)
                .context(DecodeSnafu {
                    partition: token.clone(),
                })
                .map_err(TaskError::failed)?;

            for record in records {
                if cancel.is_cancelled() {
                    return Err(TaskError::Cancelled);
                }
                self.deliver(&token, &record).await?;
                emitted += 1;

                if let ChangeStreamRecord::ChildPartitions(children) = &record {
                    self.spawn_children(&token, children)?;
                }
            }
        }

        emit!(PartitionQueryDuration {
            duration: opened.elapsed(),
            target: self.stream.clone(),
        });
        Ok(TaskOutput::with_message(format!("{emitted} records")))
    }

    /// Wait for a slot under the shared partition cap, if there is one.
    async fn acquire_permit(&self) -> Result<Option<OwnedSemaphorePermit>, TaskError> {
        let Some(limit) = &self.partition_limit else {
            return Ok(None);
        };
        let cancel = self.group.cancellation();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TaskError::Cancelled),
            permit = Arc::clone(limit).acquire_owned() => {
                permit.map(Some).map_err(|_| TaskError::Cancelled)
            }
        }
    }

    /// Open the partition query, retrying per the stream's retry policy.
    ///
    /// Only opening is retried: once rows have been read a retry would replay
    /// them and duplicate records downstream.
    async fn open(&self, query: PartitionQuery) -> Result<RowStream, TaskError> {
        let cancel = self.group.cancellation();
        let mut attempt = 1;
        loop {
            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TaskError::Cancelled),
                opened = self.source.query(query.clone()) => opened,
            };

            match opened {
                Ok(rows) => return Ok(rows),
                Err(source) if self.retry.allows_retry_after(attempt) => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        target = %self.stream,
                        partition = %query.token,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %source,
                        "Failed to open partition query, retrying"
                    );
                    emit!(QueryRetried {
                        attempt,
                        target: self.stream.clone(),
                    });
                    if cancel
                        .run_until_cancelled(tokio::time::sleep(delay))
                        .await
                        .is_none()
                    {
                        return Err(TaskError::Cancelled);
                    }
                    attempt += 1;
                }
                Err(source) => {
                    return Err(TaskError::failed(WatchError::Source {
                        partition: query.token,
                        source,
                    }));
                }
            }
        }
    }

    async fn deliver(
        &self,
        token: &PartitionToken,
        record: &ChangeStreamRecord,
    ) -> Result<(), TaskError> {
        self.sink
            .accept(token, record)
            .await
            .context(SinkSnafu {
                partition: token.clone(),
            })
            .map_err(TaskError::failed)?;

        self.stats.record(record);
        trace!(
            target = %self.stream,
            partition = %token,
            kind = record.kind().as_str(),
            "Record delivered"
        );
        emit!(RecordEmitted {
            kind: record.kind(),
            target: self.stream.clone(),
        });
        Ok(())
    }

    /// Start one task per announced child, all beginning at the record's
    /// start timestamp.
    fn spawn_children(
        self: &Arc<Self>,
        parent: &PartitionToken,
        record: &ChildPartitionsRecord,
    ) -> Result<(), TaskError> {
        if self.group.is_cancelled() {
            return Err(TaskError::Cancelled);
        }

        for child in &record.child_partitions {
            let partition = Partition::from_child(record, child);
            debug!(
                target = %self.stream,
                parent = %parent,
                partition = %child.token,
                parents = partition.parent_tokens.len(),
                start = %record.start_timestamp,
                "Submitting child partition"
            );
            if !self.spawn(partition) {
                return Err(TaskError::Cancelled);
            }
            self.stats.child_spawned();
        }
        Ok(())
    }
}
