//! Pipeline orchestration primitives.
//!
//! A process may watch several streams at once. Each stream is a
//! [`Pipeline`]; the runner drives all of them concurrently, shares one
//! shutdown token between them and reports how many finished cleanly. A
//! failing stream never stops its neighbours.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use snafu::ResultExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::GlobalConfig;
use crate::error::{AddressParseSnafu, MetricsSnafu, PipelineSetupError};
use crate::signal::shutdown_signal;

/// Shared resources for pipeline execution.
#[derive(Clone)]
pub struct PipelineContext {
    /// Optional process-wide cap on partitions holding an open query.
    pub partition_limit: Option<Arc<Semaphore>>,
    /// Cancellation token for graceful shutdown.
    pub shutdown: CancellationToken,
}

impl PipelineContext {
    pub fn new(max_concurrent_partitions: Option<usize>, shutdown: CancellationToken) -> Self {
        let partition_limit = max_concurrent_partitions.map(|n| Arc::new(Semaphore::new(n)));
        Self {
            partition_limit,
            shutdown,
        }
    }
}

/// A self-contained pipeline unit that can be executed.
///
/// Implement this trait for your specific pipeline type. The runner will
/// handle spawning and result collection.
pub trait Pipeline: Send + 'static {
    /// The key type used to identify this pipeline.
    type Key: Clone + Display + Send + 'static;

    /// The error type returned by this pipeline.
    type Error: std::error::Error + Send + 'static;

    /// Get a reference to the pipeline's key.
    fn key(&self) -> &Self::Key;

    /// Run this pipeline to completion.
    fn run(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Outcome of a [`PipelineRunner`] run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub succeeded: usize,
    /// Keys of pipelines that returned an error or panicked.
    pub failed: Vec<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Orchestrates multiple pipeline executions with shared shutdown handling.
pub struct PipelineRunner<P: Pipeline> {
    pipelines: Vec<P>,
    shutdown: CancellationToken,
    typetag: &'static str,
}

impl<P: Pipeline> PipelineRunner<P> {
    pub fn new(pipelines: Vec<P>, shutdown: CancellationToken, typetag: &'static str) -> Self {
        Self {
            pipelines,
            shutdown,
            typetag,
        }
    }

    /// Spawn the shutdown signal handler.
    pub fn spawn_shutdown_handler(&self) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.cancel();
        });
    }

    /// Run all pipelines to completion.
    pub async fn run(self) -> RunReport {
        let mut handles: JoinSet<(P::Key, Result<(), P::Error>)> = JoinSet::new();
        let typetag = self.typetag;

        for pipeline in self.pipelines {
            let key = pipeline.key().clone();
            handles.spawn(async move {
                let result = pipeline.run().await;
                (key, result)
            });
        }

        info!("Spawned {} {} tasks", handles.len(), typetag);

        let mut report = RunReport::default();
        while let Some(result) = handles.join_next().await {
            match result {
                Ok((key, Ok(()))) => {
                    info!(target = %key, "{} completed", typetag);
                    report.succeeded += 1;
                }
                Ok((key, Err(e))) => {
                    error!(target = %key, error = %e, "{} failed", typetag);
                    report.failed.push(key.to_string());
                }
                Err(e) => {
                    error!(error = %e, "{} task panicked", typetag);
                    report.failed.push(format!("<panicked {typetag}>"));
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            "All {}s complete", typetag
        );
        report
    }
}

/// Run pipelines with shared setup logic.
///
/// 1. Parse and initialize the metrics endpoint
/// 2. Create the shutdown token and pipeline context
/// 3. Create pipelines via the provided closure
/// 4. Run all pipelines with graceful shutdown handling
pub async fn run_pipelines<P, F>(
    metrics_address: &str,
    global: &GlobalConfig,
    typetag: &'static str,
    create_pipelines: F,
) -> Result<RunReport, PipelineSetupError>
where
    P: Pipeline,
    F: FnOnce(PipelineContext) -> Vec<P>,
{
    let addr = metrics_address.parse().context(AddressParseSnafu)?;
    crate::init_metrics(addr).context(MetricsSnafu)?;

    let shutdown = CancellationToken::new();
    let context = PipelineContext::new(global.max_concurrent_partitions, shutdown.clone());

    let pipelines = create_pipelines(context);

    let runner = PipelineRunner::new(pipelines, shutdown, typetag);
    runner.spawn_shutdown_handler();
    Ok(runner.run().await)
}
